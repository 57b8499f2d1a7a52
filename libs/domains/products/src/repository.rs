use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{ProductError, ProductResult};
use crate::models::{Page, PageRequest, Product};
use crate::transaction::{Transaction, TransactionScope};

/// Repository trait for Product persistence
///
/// Reads run outside any transaction. Writes are staged on a
/// [`TransactionScope`] from [`begin`](Self::begin) and become visible
/// only after [`save`](Self::save).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// All products ordered by id
    async fn list(&self) -> ProductResult<Vec<Product>>;

    /// One id-ordered page
    async fn list_page(&self, request: PageRequest) -> ProductResult<Page<Product>>;

    async fn get_by_id(&self, id: i32) -> ProductResult<Option<Product>>;

    async fn begin(&self) -> ProductResult<TransactionScope>;

    /// Stage an insert. Fails with `DuplicateId` when the id is taken.
    async fn insert(&self, scope: &mut TransactionScope, product: &Product) -> ProductResult<()>;

    /// Stage a name update. Returns false when no product has this id.
    async fn update(&self, scope: &mut TransactionScope, product: &Product)
    -> ProductResult<bool>;

    /// Stage a removal. Returns false when no product has this id.
    async fn delete(&self, scope: &mut TransactionScope, id: i32) -> ProductResult<bool>;

    /// Commit everything staged on the scope
    async fn save(&self, scope: TransactionScope) -> ProductResult<()>;
}

type Store = Arc<RwLock<BTreeMap<i32, Product>>>;

/// In-memory implementation of ProductRepository (for testing/development)
#[derive(Clone, Default)]
pub struct InMemoryProductRepository {
    products: Store,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let products = products.into_iter().map(|p| (p.id, p)).collect();
        Self {
            products: Arc::new(RwLock::new(products)),
        }
    }

    fn transaction<'a>(
        &self,
        scope: &'a mut TransactionScope,
    ) -> ProductResult<&'a mut InMemoryTransaction> {
        let transaction = scope.backend_mut::<InMemoryTransaction>()?;
        if !Arc::ptr_eq(&transaction.store, &self.products) {
            return Err(ProductError::Internal(
                "transaction scope belongs to a different store".into(),
            ));
        }
        Ok(transaction)
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn list(&self) -> ProductResult<Vec<Product>> {
        let products = self.products.read().await;
        Ok(products.values().cloned().collect())
    }

    async fn list_page(&self, request: PageRequest) -> ProductResult<Page<Product>> {
        let products = self.products.read().await;
        let total = products.len() as u64;
        let skip = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(request.size).unwrap_or(usize::MAX);

        let items = products.values().skip(skip).take(take).cloned().collect();
        Ok(Page::new(items, &request, total))
    }

    async fn get_by_id(&self, id: i32) -> ProductResult<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.get(&id).cloned())
    }

    async fn begin(&self) -> ProductResult<TransactionScope> {
        Ok(TransactionScope::new(InMemoryTransaction::new(
            self.products.clone(),
        )))
    }

    async fn insert(&self, scope: &mut TransactionScope, product: &Product) -> ProductResult<()> {
        let transaction = self.transaction(scope)?;
        if transaction.exists(product.id).await {
            return Err(ProductError::DuplicateId(product.id));
        }

        transaction.stage(product.id, Some(product.clone()), false);
        Ok(())
    }

    async fn update(
        &self,
        scope: &mut TransactionScope,
        product: &Product,
    ) -> ProductResult<bool> {
        let transaction = self.transaction(scope)?;
        if !transaction.exists(product.id).await {
            return Ok(false);
        }

        transaction.stage(product.id, Some(product.clone()), true);
        Ok(true)
    }

    async fn delete(&self, scope: &mut TransactionScope, id: i32) -> ProductResult<bool> {
        let transaction = self.transaction(scope)?;
        if !transaction.exists(id).await {
            return Ok(false);
        }

        transaction.stage(id, None, true);
        Ok(true)
    }

    async fn save(&self, scope: TransactionScope) -> ProductResult<()> {
        scope.commit().await
    }
}

/// Staged writes over the shared store.
///
/// `pending` maps an id to its new value, `None` meaning removed. `observed`
/// remembers whether each written id existed before the first write, and
/// commit refuses to apply if any of those has changed since. Lookups that
/// end in a no-op are not tracked.
pub struct InMemoryTransaction {
    store: Store,
    pending: BTreeMap<i32, Option<Product>>,
    observed: BTreeMap<i32, bool>,
}

impl InMemoryTransaction {
    fn new(store: Store) -> Self {
        Self {
            store,
            pending: BTreeMap::new(),
            observed: BTreeMap::new(),
        }
    }

    /// Whether `id` exists as seen from inside this transaction.
    /// Reading alone records nothing.
    async fn exists(&self, id: i32) -> bool {
        match self.pending.get(&id) {
            Some(staged) => staged.is_some(),
            None => self.store.read().await.contains_key(&id),
        }
    }

    /// Stage a write. `existed` is what `exists` reported; only the first
    /// write to an id fixes what commit checks against.
    fn stage(&mut self, id: i32, value: Option<Product>, existed: bool) {
        self.observed.entry(id).or_insert(existed);
        self.pending.insert(id, value);
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(self: Box<Self>) -> ProductResult<()> {
        let InMemoryTransaction {
            store,
            pending,
            observed,
        } = *self;
        let mut products = store.write().await;

        for (id, existed) in observed {
            if products.contains_key(&id) != existed {
                return Err(ProductError::Conflict(id));
            }
        }

        let writes = pending.len();
        for (id, value) in pending {
            match value {
                Some(product) => {
                    products.insert(id, product);
                }
                None => {
                    products.remove(&id);
                }
            }
        }

        tracing::debug!(writes, "In-memory transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> ProductResult<()> {
        tracing::debug!(
            discarded = self.pending.len(),
            "In-memory transaction rolled back"
        );
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> InMemoryProductRepository {
        InMemoryProductRepository::with_products([
            Product::new(1, "A"),
            Product::new(2, "B"),
            Product::new(3, "C"),
        ])
    }

    #[tokio::test]
    async fn test_writes_invisible_until_save() {
        let repo = InMemoryProductRepository::new();
        let mut scope = repo.begin().await.unwrap();

        repo.insert(&mut scope, &Product::new(7, "Seven")).await.unwrap();
        assert!(repo.get_by_id(7).await.unwrap().is_none());

        repo.save(scope).await.unwrap();
        assert_eq!(
            repo.get_by_id(7).await.unwrap(),
            Some(Product::new(7, "Seven"))
        );
    }

    #[tokio::test]
    async fn test_dropped_scope_discards_writes() {
        let repo = seeded();
        {
            let mut scope = repo.begin().await.unwrap();
            repo.delete(&mut scope, 1).await.unwrap();
            repo.insert(&mut scope, &Product::new(9, "Z")).await.unwrap();
        }

        assert_eq!(repo.list().await.unwrap().len(), 3);
        assert!(repo.get_by_id(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let repo = seeded();
        let mut scope = repo.begin().await.unwrap();
        repo.update(&mut scope, &Product::new(2, "Changed"))
            .await
            .unwrap();
        scope.rollback().await.unwrap();

        assert_eq!(repo.get_by_id(2).await.unwrap().unwrap().name, "B");
    }

    #[tokio::test]
    async fn test_insert_duplicate_id() {
        let repo = seeded();
        let mut scope = repo.begin().await.unwrap();

        let err = repo
            .insert(&mut scope, &Product::new(1, "Again"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProductError::DuplicateId(1)));
    }

    #[tokio::test]
    async fn test_insert_duplicate_within_same_scope() {
        let repo = InMemoryProductRepository::new();
        let mut scope = repo.begin().await.unwrap();

        repo.insert(&mut scope, &Product::new(5, "X")).await.unwrap();
        let err = repo
            .insert(&mut scope, &Product::new(5, "Y"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProductError::DuplicateId(5)));
    }

    #[tokio::test]
    async fn test_delete_then_insert_same_id_in_one_scope() {
        let repo = seeded();
        let mut scope = repo.begin().await.unwrap();

        assert!(repo.delete(&mut scope, 1).await.unwrap());
        repo.insert(&mut scope, &Product::new(1, "Fresh"))
            .await
            .unwrap();
        repo.save(scope).await.unwrap();

        assert_eq!(repo.get_by_id(1).await.unwrap().unwrap().name, "Fresh");
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_report_false() {
        let repo = seeded();
        let mut scope = repo.begin().await.unwrap();

        assert!(!repo.update(&mut scope, &Product::new(42, "Nope")).await.unwrap());
        assert!(!repo.delete(&mut scope, 42).await.unwrap());
        repo.save(scope).await.unwrap();

        assert_eq!(repo.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_insert_conflicts_on_commit() {
        let repo = InMemoryProductRepository::new();

        let mut first = repo.begin().await.unwrap();
        let mut second = repo.begin().await.unwrap();
        repo.insert(&mut first, &Product::new(1, "First")).await.unwrap();
        repo.insert(&mut second, &Product::new(1, "Second"))
            .await
            .unwrap();

        repo.save(first).await.unwrap();
        let err = repo.save(second).await.unwrap_err();

        assert!(matches!(err, ProductError::Conflict(1)));
        assert_eq!(repo.get_by_id(1).await.unwrap().unwrap().name, "First");
    }

    #[tokio::test]
    async fn test_missed_update_ignores_concurrent_insert() {
        let repo = InMemoryProductRepository::new();

        let mut loose = repo.begin().await.unwrap();
        assert!(!repo.update(&mut loose, &Product::new(5, "Ghost")).await.unwrap());
        assert!(!repo.delete(&mut loose, 5).await.unwrap());

        let mut creator = repo.begin().await.unwrap();
        repo.insert(&mut creator, &Product::new(5, "Real")).await.unwrap();
        repo.save(creator).await.unwrap();

        repo.save(loose).await.unwrap();
        assert_eq!(repo.get_by_id(5).await.unwrap().unwrap().name, "Real");
    }

    #[tokio::test]
    async fn test_update_conflicts_with_concurrent_delete() {
        let repo = seeded();

        let mut renamer = repo.begin().await.unwrap();
        assert!(repo.update(&mut renamer, &Product::new(2, "Renamed")).await.unwrap());

        let mut remover = repo.begin().await.unwrap();
        assert!(repo.delete(&mut remover, 2).await.unwrap());
        repo.save(remover).await.unwrap();

        let err = repo.save(renamer).await.unwrap_err();
        assert!(matches!(err, ProductError::Conflict(2)));
        assert!(repo.get_by_id(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scope_from_other_store_rejected() {
        let repo = seeded();
        let other = InMemoryProductRepository::new();
        let mut scope = other.begin().await.unwrap();

        let err = repo.delete(&mut scope, 1).await.unwrap_err();
        assert!(matches!(err, ProductError::Internal(_)));
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_id() {
        let repo = InMemoryProductRepository::with_products([
            Product::new(30, "C"),
            Product::new(10, "A"),
            Product::new(20, "B"),
        ]);

        let ids: Vec<i32> = repo.list().await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_list_page() {
        let repo = seeded();

        let page = repo.list_page(PageRequest::new(2, 2)).await.unwrap();
        assert_eq!(page.items, vec![Product::new(3, "C")]);
        assert_eq!(page.total_items, 3);
        assert_eq!(page.total_pages, 2);
        assert!(page.has_previous_page);
        assert!(!page.has_next_page);

        let beyond = repo.list_page(PageRequest::new(5, 2)).await.unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total_items, 3);
    }
}
