//! Test book store — an in-memory `BookStore` with transactional staging
//! and fault injection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_core::book::{Book, BookFilter, NewBook, Page, PageRequest};
use folio_core::error::DomainError;
use folio_core::repository::{BookStore, BookTransaction};
use folio_core::transaction::Transaction;
use uuid::Uuid;

/// Where an [`InMemoryBookStore`] transaction should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailPoint {
    /// Never fail.
    #[default]
    Never,
    /// `begin` fails.
    Begin,
    /// `insert` fails.
    Insert,
    /// `save` fails.
    Save,
    /// `delete` fails.
    Delete,
    /// `commit` fails after all writes have been staged.
    Commit,
}

#[derive(Debug, Default)]
struct State {
    books: HashMap<Uuid, Book>,
    commits: usize,
    rollbacks: usize,
    fail_point: FailPoint,
}

/// An in-memory book store.
///
/// Writes made through a transaction are staged and only become visible on
/// a successful commit. Dropping the transaction discards them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBookStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryBookStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `books`.
    #[must_use]
    pub fn with_books(books: Vec<Book>) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().books = books.into_iter().map(|b| (b.id, b)).collect();
        store
    }

    /// Makes subsequent transactions fail at `fail_point`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_at(&self, fail_point: FailPoint) {
        self.state.lock().unwrap().fail_point = fail_point;
    }

    /// Returns the committed book with `id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn get(&self, id: Uuid) -> Option<Book> {
        self.state.lock().unwrap().books.get(&id).cloned()
    }

    /// Number of committed books.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().books.len()
    }

    /// Whether the store holds no committed books.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful commits.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn commit_count(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    /// Number of explicit rollbacks.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn rollback_count(&self) -> usize {
        self.state.lock().unwrap().rollbacks
    }

    fn fail_point(&self) -> FailPoint {
        self.state.lock().unwrap().fail_point
    }
}

fn injected(operation: &str) -> DomainError {
    DomainError::Infrastructure(format!("injected failure on {operation}"))
}

#[async_trait]
impl BookStore for InMemoryBookStore {
    async fn begin(&self) -> Result<Box<dyn BookTransaction>, DomainError> {
        let fail_point = self.fail_point();
        if fail_point == FailPoint::Begin {
            return Err(injected("begin"));
        }
        Ok(Box::new(InMemoryBookTransaction {
            store: self.clone(),
            staged: HashMap::new(),
            fail_point,
        }))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>, DomainError> {
        Ok(self.get(id))
    }

    async fn find_page(
        &self,
        filter: &BookFilter,
        request: &PageRequest,
    ) -> Result<Page<Book>, DomainError> {
        let mut matching: Vec<Book> = self
            .state
            .lock()
            .unwrap()
            .books
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            request
                .sort
                .iter()
                .map(|order| order.compare(a, b))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| a.id.cmp(&b.id))
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(request.offset()).unwrap_or(usize::MAX))
            .take(request.size as usize)
            .collect();
        Ok(Page::new(items, total, request))
    }
}

/// Staged changes: `Some` is an upsert, `None` a delete.
struct InMemoryBookTransaction {
    store: InMemoryBookStore,
    staged: HashMap<Uuid, Option<Book>>,
    fail_point: FailPoint,
}

impl InMemoryBookTransaction {
    fn read(&self, id: Uuid) -> Option<Book> {
        match self.staged.get(&id) {
            Some(staged) => staged.clone(),
            None => self.store.get(id),
        }
    }
}

#[async_trait]
impl Transaction for InMemoryBookTransaction {
    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let Self {
            store,
            staged,
            fail_point,
        } = *self;
        if fail_point == FailPoint::Commit {
            return Err(injected("commit"));
        }
        let mut state = store.state.lock().unwrap();
        for (id, change) in staged {
            match change {
                Some(book) => state.books.insert(id, book),
                None => state.books.remove(&id),
            };
        }
        state.commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        self.store.state.lock().unwrap().rollbacks += 1;
        Ok(())
    }
}

#[async_trait]
impl BookTransaction for InMemoryBookTransaction {
    async fn insert(&mut self, book: &NewBook, now: DateTime<Utc>) -> Result<Book, DomainError> {
        if self.fail_point == FailPoint::Insert {
            return Err(injected("insert"));
        }
        let created = Book {
            id: Uuid::now_v7(),
            title: book.title.clone(),
            author: book.author.clone(),
            publication_year: book.publication_year,
            description: book.description.clone(),
            created_at: now,
            updated_at: now,
        };
        self.staged.insert(created.id, Some(created.clone()));
        Ok(created)
    }

    async fn find_many_for_update(&mut self, ids: &[Uuid]) -> Result<Vec<Book>, DomainError> {
        Ok(ids.iter().filter_map(|id| self.read(*id)).collect())
    }

    async fn find_for_update(&mut self, id: Uuid) -> Result<Option<Book>, DomainError> {
        Ok(self.read(id))
    }

    async fn save(&mut self, book: &Book) -> Result<(), DomainError> {
        if self.fail_point == FailPoint::Save {
            return Err(injected("save"));
        }
        self.staged.insert(book.id, Some(book.clone()));
        Ok(())
    }

    async fn delete(&mut self, id: Uuid) -> Result<bool, DomainError> {
        if self.fail_point == FailPoint::Delete {
            return Err(injected("delete"));
        }
        let existed = self.read(id).is_some();
        self.staged.insert(id, None);
        Ok(existed)
    }
}
