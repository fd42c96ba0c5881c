use crate::errors::{DataError, DataResult, ErrorKind};
use crate::model::{Order, Sort};

/// Pagination request: page number, page size and ordering.
///
/// A pageable without a size is *unpaged*: it still carries a sort but asks
/// for every matching row. Page numbers start at zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pageable {
    number: u32,
    size: Option<u32>,
    sort: Sort,
}

impl Pageable {
    pub fn unpaged() -> Self {
        Pageable {
            number: 0,
            size: None,
            sort: Sort::unsorted(),
        }
    }

    pub fn unpaged_sorted(sort: Sort) -> Self {
        Pageable {
            number: 0,
            size: None,
            sort,
        }
    }

    /// Requests page `number` of `size` rows.
    ///
    /// # Errors
    ///
    /// Returns `IllegalArgument` if `size` is zero.
    pub fn from(number: u32, size: u32) -> DataResult<Self> {
        Pageable::from_sorted(number, size, Sort::unsorted())
    }

    pub fn from_sorted(number: u32, size: u32, sort: Sort) -> DataResult<Self> {
        if size == 0 {
            log::error!("Page size must be greater than zero");
            return Err(DataError::new(
                "Page size must be greater than zero",
                ErrorKind::IllegalArgument,
            ));
        }
        Ok(Pageable {
            number,
            size: Some(size),
            sort,
        })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn size(&self) -> Option<u32> {
        self.size
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    #[inline]
    pub fn is_unpaged(&self) -> bool {
        self.size.is_none()
    }

    /// Index of the first row of this page.
    pub fn offset(&self) -> u64 {
        match self.size {
            Some(size) => self.number as u64 * size as u64,
            None => 0,
        }
    }

    pub fn next(&self) -> Pageable {
        match self.size {
            Some(_) => Pageable {
                number: self.number.saturating_add(1),
                ..self.clone()
            },
            None => self.clone(),
        }
    }

    pub fn previous(&self) -> Pageable {
        Pageable {
            number: self.number.saturating_sub(1),
            ..self.clone()
        }
    }

    pub fn with_sort(&self, sort: Sort) -> Pageable {
        Pageable {
            sort,
            ..self.clone()
        }
    }

    pub fn order(&self, order: Order) -> Pageable {
        self.with_sort(self.sort.clone().and(order))
    }

    pub fn without_sort(&self) -> Pageable {
        self.with_sort(Sort::unsorted())
    }
}
