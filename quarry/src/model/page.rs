use crate::errors::DataResult;
use crate::model::Pageable;

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    content: Vec<T>,
    pageable: Pageable,
    total_size: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, pageable: Pageable, total_size: u64) -> Self {
        Page {
            content,
            pageable,
            total_size,
        }
    }

    pub fn empty(pageable: Pageable) -> Self {
        Page::new(Vec::new(), pageable, 0)
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn pageable(&self) -> &Pageable {
        &self.pageable
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn number(&self) -> u32 {
        self.pageable.number()
    }

    /// Requested page size, or the content length when unpaged.
    pub fn size(&self) -> usize {
        match self.pageable.size() {
            Some(size) => size as usize,
            None => self.content.len(),
        }
    }

    pub fn total_pages(&self) -> u64 {
        match self.pageable.size() {
            Some(size) => self.total_size.div_ceil(size as u64),
            None => 1,
        }
    }

    pub fn has_next(&self) -> bool {
        (self.number() as u64 + 1) < self.total_pages()
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            pageable: self.pageable,
            total_size: self.total_size,
        }
    }

    pub fn try_map<U, F: FnMut(T) -> DataResult<U>>(self, f: F) -> DataResult<Page<U>> {
        Ok(Page {
            content: self.content.into_iter().map(f).collect::<DataResult<Vec<U>>>()?,
            pageable: self.pageable,
            total_size: self.total_size,
        })
    }

    pub fn into_slice(self) -> Slice<T> {
        Slice::new(self.content, self.pageable)
    }
}

/// A page of results without a total count.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice<T> {
    content: Vec<T>,
    pageable: Pageable,
}

impl<T> Slice<T> {
    pub fn new(content: Vec<T>, pageable: Pageable) -> Self {
        Slice { content, pageable }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn pageable(&self) -> &Pageable {
        &self.pageable
    }

    pub fn number(&self) -> u32 {
        self.pageable.number()
    }

    pub fn size(&self) -> usize {
        match self.pageable.size() {
            Some(size) => size as usize,
            None => self.content.len(),
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Slice<U> {
        Slice {
            content: self.content.into_iter().map(f).collect(),
            pageable: self.pageable,
        }
    }

    pub fn try_map<U, F: FnMut(T) -> DataResult<U>>(self, f: F) -> DataResult<Slice<U>> {
        Ok(Slice {
            content: self.content.into_iter().map(f).collect::<DataResult<Vec<U>>>()?,
            pageable: self.pageable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        let page = Page::new(vec![1, 2, 3], Pageable::from(0, 3).unwrap(), 10);
        assert_eq!(page.total_pages(), 4);
        assert_eq!(page.size(), 3);
        assert!(page.has_next());
    }

    #[test]
    fn unpaged_page_is_single() {
        let page = Page::new(vec![1, 2], Pageable::unpaged(), 2);
        assert_eq!(page.total_pages(), 1);
        assert_eq!(page.size(), 2);
        assert!(!page.has_next());
    }

    #[test]
    fn map_keeps_metadata() {
        let page = Page::new(vec![1, 2], Pageable::from(1, 2).unwrap(), 6).map(|v| v * 10);
        assert_eq!(page.content(), &[10, 20]);
        assert_eq!(page.total_size(), 6);
        assert_eq!(page.number(), 1);
    }

    #[test]
    fn try_map_stops_on_error() {
        let page = Page::new(vec![1, 2], Pageable::unpaged(), 2);
        let result = page.try_map(|v| if v == 2 { Err("two".into()) } else { Ok(v) });
        assert!(result.is_err());
    }

    #[test]
    fn slice_from_page() {
        let slice = Page::new(vec!["a"], Pageable::from(0, 5).unwrap(), 1).into_slice();
        assert_eq!(slice.content(), &["a"]);
        assert_eq!(slice.size(), 5);
    }
}
