use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Ascending => write!(f, "ASC"),
            SortOrder::Descending => write!(f, "DESC"),
        }
    }
}

/// Ordering on a single property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Order {
    property: String,
    direction: SortOrder,
    ignore_case: bool,
}

impl Order {
    pub fn new(property: &str, direction: SortOrder, ignore_case: bool) -> Self {
        Order {
            property: property.to_string(),
            direction,
            ignore_case,
        }
    }

    pub fn asc(property: &str) -> Self {
        Order::new(property, SortOrder::Ascending, false)
    }

    pub fn desc(property: &str) -> Self {
        Order::new(property, SortOrder::Descending, false)
    }

    /// Compares string values of this property case-insensitively.
    pub fn ignoring_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn direction(&self) -> SortOrder {
        self.direction
    }

    pub fn is_ascending(&self) -> bool {
        self.direction == SortOrder::Ascending
    }

    pub fn is_ignore_case(&self) -> bool {
        self.ignore_case
    }
}

/// An ordered list of [Order]s. An empty sort leaves result order to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sort {
    orders: Vec<Order>,
}

impl Sort {
    pub fn unsorted() -> Self {
        Sort { orders: Vec::new() }
    }

    pub fn by(orders: Vec<Order>) -> Self {
        Sort { orders }
    }

    pub fn of(order: Order) -> Self {
        Sort { orders: vec![order] }
    }

    /// Appends `order`, replacing an existing order on the same property.
    pub fn and(mut self, order: Order) -> Self {
        self.orders.retain(|o| o.property != order.property);
        self.orders.push(order);
        self
    }

    /// Appends every order of `other`.
    pub fn merge(self, other: &Sort) -> Self {
        other.orders.iter().cloned().fold(self, |sort, order| sort.and(order))
    }

    pub fn is_sorted(&self) -> bool {
        !self.orders.is_empty()
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn order_for(&self, property: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.property == property)
    }
}
