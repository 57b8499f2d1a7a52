use std::sync::Arc;
use validator::Validate;

use crate::error::ProductResult;
use crate::models::{Page, PageRequest, Product};
use crate::repository::ProductRepository;
use crate::transaction::TransactionScope;

/// Service layer for Product business logic
///
/// Every write runs in its own transaction scope: committed when the
/// repository call succeeds, rolled back when it fails.
#[derive(Clone)]
pub struct ProductService<R: ProductRepository> {
    repository: Arc<R>,
}

impl<R: ProductRepository> ProductService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    /// List all products ordered by id
    pub async fn list_products(&self) -> ProductResult<Vec<Product>> {
        self.repository.list().await
    }

    /// One page of products ordered by id
    pub async fn list_products_page(&self, request: PageRequest) -> ProductResult<Page<Product>> {
        request.validate()?;
        self.repository.list_page(request).await
    }

    pub async fn get_product(&self, id: i32) -> ProductResult<Option<Product>> {
        self.repository.get_by_id(id).await
    }

    /// Create a product with a client-chosen id
    pub async fn create_product(&self, product: Product) -> ProductResult<Product> {
        let mut scope = self.repository.begin().await?;
        let staged = self.repository.insert(&mut scope, &product).await;
        self.finish(scope, staged).await?;

        tracing::info!(product_id = product.id, "Created product");
        Ok(product)
    }

    /// Rename a product. Returns false when the id does not exist.
    pub async fn update_product(&self, product: Product) -> ProductResult<bool> {
        let mut scope = self.repository.begin().await?;
        let staged = self.repository.update(&mut scope, &product).await;
        let updated = self.finish(scope, staged).await?;

        if updated {
            tracing::info!(product_id = product.id, "Updated product");
        } else {
            tracing::debug!(product_id = product.id, "Update skipped, product not found");
        }
        Ok(updated)
    }

    /// Delete a product. Returns false, without opening a transaction, when
    /// the id does not exist.
    pub async fn delete_product(&self, id: i32) -> ProductResult<bool> {
        if self.repository.get_by_id(id).await?.is_none() {
            return Ok(false);
        }

        let mut scope = self.repository.begin().await?;
        let staged = self.repository.delete(&mut scope, id).await;
        let deleted = self.finish(scope, staged).await?;

        if deleted {
            tracing::info!(product_id = id, "Deleted product");
        }
        Ok(deleted)
    }

    /// Commit on success, roll back on failure. The staging error wins
    /// over a rollback error.
    async fn finish<T>(
        &self,
        scope: TransactionScope,
        staged: ProductResult<T>,
    ) -> ProductResult<T> {
        match staged {
            Ok(value) => {
                self.repository.save(scope).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = scope.rollback().await {
                    tracing::error!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}
