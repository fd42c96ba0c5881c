use crate::common::{Document, PropagatedContext, Value};
use crate::model::PersistentEntity;

/// Insert, update or delete of a single entity.
#[derive(Debug, Clone)]
pub struct EntityOperation {
    entity: PersistentEntity,
    document: Document,
    context: PropagatedContext,
}

impl EntityOperation {
    pub fn new(entity: PersistentEntity, document: Document, context: PropagatedContext) -> Self {
        EntityOperation {
            entity,
            document,
            context,
        }
    }

    pub fn entity(&self) -> &PersistentEntity {
        &self.entity
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn id(&self) -> Value {
        self.document.get(self.entity.id_property())
    }

    pub fn context(&self) -> &PropagatedContext {
        &self.context
    }
}

/// Insert, update or delete of several entities of one type.
#[derive(Debug, Clone)]
pub struct BatchOperation {
    entity: PersistentEntity,
    documents: Vec<Document>,
    context: PropagatedContext,
}

impl BatchOperation {
    pub fn new(entity: PersistentEntity, documents: Vec<Document>, context: PropagatedContext) -> Self {
        BatchOperation {
            entity,
            documents,
            context,
        }
    }

    pub fn entity(&self) -> &PersistentEntity {
        &self.entity
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn context(&self) -> &PropagatedContext {
        &self.context
    }

    pub fn split(&self) -> impl Iterator<Item = EntityOperation> + '_ {
        self.documents
            .iter()
            .map(|doc| EntityOperation::new(self.entity.clone(), doc.clone(), self.context.clone()))
    }
}
