use crate::errors::DataResult;
use crate::intercept::{MethodResult, RepositoryBean};
use crate::metadata::MethodInvocationContext;
use crate::operations::Capability;
use std::fmt::{Display, Formatter};

/// Executes one kind of repository method.
///
/// An interceptor is created once per repository method and reused for every
/// call, so implementations keep no per-call state.
pub trait DataInterceptor: Send + Sync {
    fn kind(&self) -> InterceptorKind;

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult>;
}

macro_rules! interceptor_kinds {
    ($($capability:ident => [$($kind:ident),* $(,)?]),* $(,)?) => {
        /// Every built-in interceptor.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum InterceptorKind {
            $($($kind,)*)*
        }

        impl InterceptorKind {
            pub const ALL: &'static [InterceptorKind] = &[$($(InterceptorKind::$kind,)*)*];

            /// The name method metadata uses to reference this interceptor.
            pub fn name(&self) -> &'static str {
                match self {
                    $($(InterceptorKind::$kind => concat!(stringify!($kind), "Interceptor"),)*)*
                }
            }

            /// Backend shape the interceptor executes against.
            pub fn capability(&self) -> Capability {
                match self {
                    $($(InterceptorKind::$kind => Capability::$capability,)*)*
                }
            }

            pub fn from_name(name: &str) -> Option<InterceptorKind> {
                InterceptorKind::ALL.iter().copied().find(|kind| kind.name() == name)
            }
        }
    };
}

interceptor_kinds! {
    Blocking => [
        FindOne,
        FindOptional,
        FindById,
        FindAll,
        FindPage,
        FindSlice,
        FindStream,
        Count,
        Exists,
        Save,
        SaveAll,
        Update,
        UpdateAll,
        UpdateQuery,
        Delete,
        DeleteAll,
        DeleteQuery,
        FindOneSpecification,
        FindAllSpecification,
        FindPageSpecification,
        CountSpecification,
        ExistsSpecification,
        DeleteAllSpecification,
        UpdateAllSpecification,
    ],
    Async => [
        FindOneAsync,
        FindByIdAsync,
        FindAllAsync,
        FindPageAsync,
        CountAsync,
        ExistsAsync,
        SaveAsync,
        UpdateQueryAsync,
        DeleteAllAsync,
    ],
    Reactive => [
        FindOneReactive,
        FindByIdReactive,
        FindAllReactive,
        FindPageReactive,
        CountReactive,
        ExistsReactive,
        SaveReactive,
        UpdateQueryReactive,
        DeleteAllReactive,
        FindOneReactiveSpecification,
        FindAllReactiveSpecification,
        FindPageReactiveSpecification,
        CountReactiveSpecification,
        ExistsReactiveSpecification,
        DeleteAllReactiveSpecification,
        UpdateAllReactiveSpecification,
    ],
}

impl Display for InterceptorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
