use std::any::Any;

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, SqlErr, TransactionTrait,
};

use crate::{
    entity,
    error::{ProductError, ProductResult},
    models::{Page, PageRequest, Product},
    repository::ProductRepository,
    transaction::{Transaction, TransactionScope},
};

pub struct PgProductRepository {
    db: DatabaseConnection,
}

impl PgProductRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn connection(scope: &mut TransactionScope) -> ProductResult<&DatabaseTransaction> {
        Ok(&scope.backend_mut::<PgTransaction>()?.txn)
    }
}

fn map_insert_error(err: DbErr, id: i32) -> ProductError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => ProductError::DuplicateId(id),
        _ => ProductError::Database(err),
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn list(&self) -> ProductResult<Vec<Product>> {
        let models = entity::Entity::find()
            .order_by_asc(entity::Column::Id)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn list_page(&self, request: PageRequest) -> ProductResult<Page<Product>> {
        let paginator = entity::Entity::find()
            .order_by_asc(entity::Column::Id)
            .paginate(&self.db, request.size);

        let total = paginator.num_items().await?;
        // offset saturates, so a huge page lands here instead of overflowing in fetch_page
        if request.offset() >= total {
            return Ok(Page::new(Vec::new(), &request, total));
        }
        let models = paginator.fetch_page(request.page.saturating_sub(1)).await?;

        Ok(Page::new(
            models.into_iter().map(Into::into).collect(),
            &request,
            total,
        ))
    }

    async fn get_by_id(&self, id: i32) -> ProductResult<Option<Product>> {
        let model = entity::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn begin(&self) -> ProductResult<TransactionScope> {
        let txn = self.db.begin().await?;
        Ok(TransactionScope::new(PgTransaction { txn }))
    }

    async fn insert(&self, scope: &mut TransactionScope, product: &Product) -> ProductResult<()> {
        let txn = Self::connection(scope)?;
        let active_model: entity::ActiveModel = product.into();

        entity::Entity::insert(active_model)
            .exec_without_returning(txn)
            .await
            .map_err(|e| map_insert_error(e, product.id))?;

        tracing::debug!(product_id = product.id, "Staged product insert");
        Ok(())
    }

    async fn update(
        &self,
        scope: &mut TransactionScope,
        product: &Product,
    ) -> ProductResult<bool> {
        let txn = Self::connection(scope)?;

        let result = entity::Entity::update_many()
            .col_expr(entity::Column::Name, Expr::value(product.name.clone()))
            .filter(entity::Column::Id.eq(product.id))
            .exec(txn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn delete(&self, scope: &mut TransactionScope, id: i32) -> ProductResult<bool> {
        let txn = Self::connection(scope)?;
        let result = entity::Entity::delete_by_id(id).exec(txn).await?;

        Ok(result.rows_affected > 0)
    }

    async fn save(&self, scope: TransactionScope) -> ProductResult<()> {
        scope.commit().await
    }
}

/// Open database transaction. Dropping it without commit rolls back.
pub struct PgTransaction {
    txn: DatabaseTransaction,
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(self: Box<Self>) -> ProductResult<()> {
        self.txn
            .commit()
            .await
            .map_err(|e| ProductError::Transaction(format!("commit failed: {}", e)))
    }

    async fn rollback(self: Box<Self>) -> ProductResult<()> {
        self.txn
            .rollback()
            .await
            .map_err(|e| ProductError::Transaction(format!("rollback failed: {}", e)))
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use std::collections::BTreeMap;
    use validator::Validate;

    #[tokio::test]
    async fn test_get_by_id_maps_model() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![entity::Model {
                id: 4,
                name: "Desk".to_string(),
            }]])
            .into_connection();
        let repo = PgProductRepository::new(db);

        let product = repo.get_by_id(4).await.unwrap();
        assert_eq!(product, Some(Product::new(4, "Desk")));
    }

    fn count_row(total: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("num_items", Value::BigInt(Some(total)))])
    }

    #[tokio::test]
    async fn test_list_page_fetches_rows_within_range() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![count_row(3)]])
            .append_query_results([vec![entity::Model {
                id: 3,
                name: "C".to_string(),
            }]])
            .into_connection();
        let repo = PgProductRepository::new(db);

        let page = repo.list_page(PageRequest::new(2, 2)).await.unwrap();
        assert_eq!(page.items, vec![Product::new(3, "C")]);
        assert_eq!(page.total_items, 3);
        assert!(page.has_previous_page);
        assert!(!page.has_next_page);
    }

    #[tokio::test]
    async fn test_list_page_far_past_end_is_empty() {
        // Only the count query is mocked; a page query would fail the test.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![count_row(3)]])
            .into_connection();
        let repo = PgProductRepository::new(db);

        let request = PageRequest::new(u64::MAX, 100);
        request.validate().unwrap();

        let page = repo.list_page(request).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_items, 3);
        assert_eq!(page.page, u64::MAX);
        assert!(!page.has_next_page);
    }

    #[tokio::test]
    async fn test_list_maps_models() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                entity::Model {
                    id: 1,
                    name: "A".to_string(),
                },
                entity::Model {
                    id: 2,
                    name: "B".to_string(),
                },
            ]])
            .into_connection();
        let repo = PgProductRepository::new(db);

        let products = repo.list().await.unwrap();
        assert_eq!(products, vec![Product::new(1, "A"), Product::new(2, "B")]);
    }

    #[tokio::test]
    async fn test_update_and_delete_report_rows_affected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .into_connection();
        let repo = PgProductRepository::new(db);

        let mut scope = repo.begin().await.unwrap();
        assert!(repo
            .update(&mut scope, &Product::new(1, "Renamed"))
            .await
            .unwrap());
        assert!(!repo.delete(&mut scope, 99).await.unwrap());
        repo.save(scope).await.unwrap();
    }

    #[test]
    fn test_non_unique_insert_error_stays_database_error() {
        let err = map_insert_error(DbErr::Custom("disk full".into()), 1);
        assert!(matches!(err, ProductError::Database(_)));
    }
}
