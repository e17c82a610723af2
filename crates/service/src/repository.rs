//! Generic repository decoupling domain entities from persistence shape.
//!
//! A [`Repository`] is parameterised by the aggregate it serves; the
//! aggregate supplies its storage mapping through [`AggregateMapping`] and
//! its model supplies the reverse conversion ([`TryIntoEntity`]) and the
//! aggregate-specific not-found classification ([`NotFoundKind`]) as trait
//! bounds, so a missing capability is a compile error rather than a runtime
//! configuration failure.
//!
//! Conditions accumulate on the value and terminal operations consume it:
//! a condition chain belongs to exactly one logical call and can never be
//! shared across concurrent operations.

use std::marker::PhantomData;

use async_trait::async_trait;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, Condition, DatabaseConnection, DatabaseTransaction, EntityTrait, IdenStatic,
    IntoActiveModel, Iterable, Order, PaginatorTrait, PrimaryKeyToColumn, QueryFilter, QueryOrder,
    Select, Value,
};

use common::errors::AppError;
use common::pagination::Pagination;

use crate::scope::RequestScope;

/// Conversion capability from a storage row back into its domain entity.
pub trait TryIntoEntity {
    type Entity;
    fn try_into_entity(self) -> Result<Self::Entity, AppError>;
}

/// Aggregate-specific not-found classification carried by the model type,
/// so retrieval misses map to a 404-class code per aggregate.
pub trait NotFoundKind {
    fn not_found() -> AppError;
}

/// Mapping from a domain aggregate onto its storage representation,
/// including cascading persistence of populated associations.
#[async_trait]
pub trait AggregateMapping: Send + Sync + Sized {
    type Store: EntityTrait;
    type Active: ActiveModelTrait<Entity = Self::Store> + Send;

    /// One-way conversion to the storage row.
    fn to_model(&self) -> Self::Active;

    /// Fold the saved row back into the entity in place (generated values,
    /// audit timestamps), keeping populated associations.
    fn absorb(&mut self, saved: <Self::Store as EntityTrait>::Model) -> Result<(), AppError>;

    /// Persist populated associations after the root row was saved.
    async fn save_associations(&self, _txn: &DatabaseTransaction) -> Result<(), AppError> {
        Ok(())
    }

    /// Hydrate a named association from storage.
    async fn load_association(&mut self, name: &str, _read: &DatabaseConnection) -> Result<(), AppError> {
        Err(AppError::internal(format!("unknown association `{name}`")))
    }
}

/// Insert-or-update a row keyed by its primary key, returning the saved row.
pub(crate) async fn upsert<AM>(
    model: AM,
    txn: &DatabaseTransaction,
) -> Result<<AM::Entity as EntityTrait>::Model, AppError>
where
    AM: ActiveModelTrait + Send,
    <AM::Entity as EntityTrait>::Model: IntoActiveModel<AM>,
{
    let pk_columns: Vec<<AM::Entity as EntityTrait>::Column> = <AM::Entity as EntityTrait>::PrimaryKey::iter()
        .map(PrimaryKeyToColumn::into_column)
        .collect();
    let pk_names: Vec<&str> = pk_columns.iter().map(|c| c.as_str()).collect();
    let mut on_conflict = OnConflict::columns(pk_columns.clone());
    on_conflict.update_columns(
        <AM::Entity as EntityTrait>::Column::iter().filter(|c| !pk_names.contains(&c.as_str())),
    );
    <AM::Entity as EntityTrait>::insert(model)
        .on_conflict(on_conflict)
        .exec_with_returning(txn)
        .await
        .map_err(|e| AppError::internal("failed to save persistence model").with_source(e))
}

/// Condition-accumulating repository over one aggregate.
pub struct Repository<A: AggregateMapping> {
    condition: Condition,
    order: Vec<(String, Order)>,
    preloads: Vec<String>,
    _aggregate: PhantomData<A>,
}

impl<A: AggregateMapping> Default for Repository<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: AggregateMapping> Repository<A> {
    pub fn new() -> Self {
        Self {
            condition: Condition::all(),
            order: Vec::new(),
            preloads: Vec::new(),
            _aggregate: PhantomData,
        }
    }

    /// Append a raw condition fragment with bound arguments. Conditions are
    /// ANDed in the order they were added.
    pub fn filter<V, I>(mut self, fragment: &str, values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        self.condition = self.condition.add(Expr::cust_with_values(fragment, values));
        self
    }

    /// Append an ascending order on a raw column expression.
    pub fn order_by_asc(mut self, fragment: &str) -> Self {
        self.order.push((fragment.to_string(), Order::Asc));
        self
    }

    /// Append a descending order on a raw column expression.
    pub fn order_by_desc(mut self, fragment: &str) -> Self {
        self.order.push((fragment.to_string(), Order::Desc));
        self
    }

    /// Request a named association to be loaded with retrieved entities.
    pub fn preload(mut self, association: &str) -> Self {
        self.preloads.push(association.to_string());
        self
    }

    fn select(&self) -> Select<A::Store> {
        let mut query = <A::Store as EntityTrait>::find().filter(self.condition.clone());
        for (fragment, order) in &self.order {
            query = query.order_by(Expr::cust(fragment.as_str()), order.clone());
        }
        query
    }

    /// Count rows matching the accumulated conditions on the read session.
    pub async fn count(self, scope: &RequestScope) -> Result<u64, AppError>
    where
        <A::Store as EntityTrait>::Model: Send + Sync,
    {
        let read = scope.read();
        self.select()
            .count(&read)
            .await
            .map_err(|e| AppError::internal("failed to count rows").with_source(e))
    }

    /// Delete rows matching the accumulated conditions inside the write
    /// transaction; returns the number of rows affected.
    pub async fn delete(self, scope: &RequestScope) -> Result<u64, AppError> {
        let txn = scope.write()?;
        let result = <A::Store as EntityTrait>::delete_many()
            .filter(self.condition)
            .exec(txn)
            .await
            .map_err(|e| AppError::internal("failed to delete rows").with_source(e))?;
        Ok(result.rows_affected)
    }

    /// Upsert the aggregate root inside the write transaction, cascade its
    /// populated associations, then fold the saved row back into `entity`.
    ///
    /// Uniqueness is expected to have been validated beforehand; a
    /// constraint violation here surfaces as an internal error.
    pub async fn persist(self, scope: &RequestScope, entity: &mut A) -> Result<(), AppError>
    where
        <A::Store as EntityTrait>::Model: IntoActiveModel<A::Active>,
    {
        let txn = scope.write()?;
        let saved = upsert(entity.to_model(), txn).await?;
        entity.save_associations(txn).await?;
        entity.absorb(saved)?;
        Ok(())
    }

    /// Fetch the first matching row as an entity, applying preloads. A miss
    /// fails with the aggregate's own not-found code.
    pub async fn get_one(self, scope: &RequestScope) -> Result<A, AppError>
    where
        <A::Store as EntityTrait>::Model: TryIntoEntity<Entity = A> + NotFoundKind,
    {
        let read = scope.read();
        let row = self
            .select()
            .one(&read)
            .await
            .map_err(|e| AppError::internal("failed to fetch row").with_source(e))?
            .ok_or_else(<<A::Store as EntityTrait>::Model as NotFoundKind>::not_found)?;
        let mut entity = row.try_into_entity()?;
        for association in &self.preloads {
            entity.load_association(association, &read).await?;
        }
        Ok(entity)
    }

    /// Fetch every matching row as entities, applying preloads.
    pub async fn get_all(self, scope: &RequestScope) -> Result<Vec<A>, AppError>
    where
        <A::Store as EntityTrait>::Model: TryIntoEntity<Entity = A>,
    {
        let read = scope.read();
        let rows = self
            .select()
            .all(&read)
            .await
            .map_err(|e| AppError::internal("failed to fetch rows").with_source(e))?;
        let mut entities = Vec::with_capacity(rows.len());
        for row in rows {
            let mut entity = row.try_into_entity()?;
            for association in &self.preloads {
                entity.load_association(association, &read).await?;
            }
            entities.push(entity);
        }
        Ok(entities)
    }

    /// Fetch one page of matching rows plus the total match count ignoring
    /// pagination. Non-positive page/size normalise to page 1 / size 10.
    pub async fn get_page(
        self,
        scope: &RequestScope,
        page: u64,
        size: u64,
    ) -> Result<(Vec<A>, u64), AppError>
    where
        <A::Store as EntityTrait>::Model: TryIntoEntity<Entity = A> + Send + Sync,
    {
        let (page_index, per_page) = Pagination { page, per_page: size }.normalize();
        let read = scope.read();
        let paginator = self.select().paginate(&read, per_page);
        let total = paginator
            .num_items()
            .await
            .map_err(|e| AppError::internal("failed to count page total").with_source(e))?;
        let rows = paginator
            .fetch_page(page_index)
            .await
            .map_err(|e| AppError::internal("failed to fetch page").with_source(e))?;
        let mut entities = Vec::with_capacity(rows.len());
        for row in rows {
            let mut entity = row.try_into_entity()?;
            for association in &self.preloads {
                entity.load_association(association, &read).await?;
            }
            entities.push(entity);
        }
        Ok((entities, total))
    }
}
