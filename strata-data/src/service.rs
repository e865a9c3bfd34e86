use std::marker::PhantomData;

use futures_util::future::try_join_all;
use tracing::debug;

use crate::chunks::ModelChunks;
use crate::error::DataError;
use crate::expr::col;
use crate::filter::Filter;
use crate::model::Model;
use crate::page::SearchPage;
use crate::pagination::Pagination;
use crate::query::QueryBuilder;
use crate::session::Session;
use crate::sorting::Sorting;
use crate::value::{IntoValues, Key};

/// Default number of records per chunk in bulk operations.
pub const DEFAULT_CHUNK_SIZE: u64 = 100;

/// Generic CRUD and bulk operations for one model type over a session.
///
/// A service is bound to a single model `M` and a single [`Session`]; scope
/// one per unit of work. Pass `&session` to let several services share the
/// same transaction.
///
/// `create`, `update` and the bulk writers commit; `delete` and
/// `bulk_delete` leave the commit to the caller.
///
/// # Example
///
/// ```ignore
/// let items = DataService::<Item, _>::new(&session);
/// let lamp = items.create(json!({"name": "lamp", "price": 12})).await?;
/// let cheap = items
///     .search(Some(&Filter::new([col("price").lt(20)])), None, None)
///     .await?;
/// ```
pub struct DataService<M, S> {
    session: S,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Model, S: Session> DataService<M, S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            _marker: PhantomData,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    /// The base query over all records of `M`.
    pub fn query(&self) -> QueryBuilder {
        QueryBuilder::for_model::<M>()
    }

    /// Records matching `filter`, ordered by `sorting`, windowed by `pagination`.
    ///
    /// Fragments are applied in that fixed order.
    pub async fn search(
        &self,
        filter: Option<&Filter>,
        sorting: Option<&Sorting>,
        pagination: Option<&Pagination>,
    ) -> Result<Vec<M>, DataError> {
        let mut query = self.query();
        if let Some(filter) = filter {
            query = filter.apply(query);
        }
        if let Some(sorting) = sorting {
            query = sorting.apply(query);
        }
        if let Some(pagination) = pagination {
            query = pagination.apply(query);
        }
        self.session.fetch_all(&query).await
    }

    /// One page of results with `prev_page` / `next_page` markers,
    /// computed without a count query.
    pub async fn search_page(
        &self,
        filter: Option<&Filter>,
        sorting: Option<&Sorting>,
        pagination: Pagination,
    ) -> Result<SearchPage<M>, DataError> {
        let lookahead = pagination.with_fetch_one_more(true);
        let items = self.search(filter, sorting, Some(&lookahead)).await?;
        Ok(SearchPage::from_lookahead(items, &pagination))
    }

    /// At most one record matching `filter`.
    ///
    /// Fails with [`DataError::MultipleResults`] when the filter is ambiguous.
    pub async fn get(&self, filter: &Filter) -> Result<Option<M>, DataError> {
        let query = filter.apply(self.query());
        self.session.fetch_one_or_none(&query).await
    }

    /// Build a record from `data`, insert it and commit.
    pub async fn create(&self, data: impl IntoValues) -> Result<M, DataError> {
        let instance = M::from_values(&data.into_values()?)?;
        let stored = self.session.insert(instance).await?;
        self.session.commit().await?;
        Ok(stored)
    }

    /// Overwrite the fields `data` explicitly carries, then commit.
    ///
    /// Fields absent from `data` keep their current value. A patch that sets
    /// primary-key fields re-keys this record.
    pub async fn update(&self, mut instance: M, data: impl IntoValues) -> Result<M, DataError> {
        let key = instance.primary_key_values();
        instance.apply_values(&data.into_values()?)?;
        self.session.update(&key, &instance).await?;
        self.session.commit().await?;
        Ok(instance)
    }

    /// Stage the deletion of `instance`. Does not commit.
    pub async fn delete(&self, instance: &M) -> Result<(), DataError> {
        self.session.delete(instance).await
    }

    /// Filter equating each primary-key column with the matching element of `id`.
    pub fn id_filter(&self, id: impl Into<Key>) -> Result<Filter, DataError> {
        let columns = M::key_columns(&id.into())?;
        Ok(columns
            .into_iter()
            .fold(Filter::all(), |filter, (column, value)| {
                filter.and([col(column).eq(value)])
            }))
    }

    pub async fn get_by_id(&self, id: impl Into<Key>) -> Result<Option<M>, DataError> {
        let filter = self.id_filter(id)?;
        self.get(&filter).await
    }

    /// Returns `None`, without writing anything, when no record has this id.
    pub async fn update_by_id(
        &self,
        id: impl Into<Key>,
        data: impl IntoValues,
    ) -> Result<Option<M>, DataError> {
        match self.get_by_id(id).await? {
            Some(instance) => self.update(instance, data).await.map(Some),
            None => Ok(None),
        }
    }

    /// Returns `false` when no record has this id. Does not commit.
    pub async fn delete_by_id(&self, id: impl Into<Key>) -> Result<bool, DataError> {
        match self.get_by_id(id).await? {
            Some(instance) => {
                self.delete(&instance).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Iterate the records matching `filter` in chunks of at most `chunk_size`.
    pub fn model_chunks(&self, filter: Option<&Filter>, chunk_size: u64) -> ModelChunks<'_, M, S> {
        ModelChunks::new(self, filter, chunk_size)
    }

    /// Insert one record per element of `values`, committing every
    /// `chunk_size` records and once more for the remainder.
    ///
    /// A failed commit leaves earlier chunks committed.
    pub async fn bulk_create<I>(&self, values: I, chunk_size: u64) -> Result<usize, DataError>
    where
        I: IntoIterator,
        I::Item: IntoValues,
    {
        let chunk_size = usize::try_from(chunk_size.max(1)).unwrap_or(usize::MAX);
        let mut count = 0usize;
        for data in values {
            let instance = M::from_values(&data.into_values()?)?;
            self.session.insert(instance).await?;
            count += 1;
            if count % chunk_size == 0 {
                self.session.commit().await?;
                debug!(table = M::table_name(), count, "bulk_create committed chunk");
            }
        }
        if count % chunk_size != 0 {
            self.session.commit().await?;
            debug!(table = M::table_name(), count, "bulk_create committed remainder");
        }
        Ok(count)
    }

    /// Apply the partial update `data` to every record matching `filter`,
    /// committing once per chunk.
    ///
    /// Updating a field the filter tests can move records across page
    /// boundaries and cause some to be skipped.
    pub async fn bulk_update(
        &self,
        filter: &Filter,
        data: impl IntoValues,
        chunk_size: u64,
    ) -> Result<usize, DataError> {
        let patch = data.into_values()?;
        let mut chunks = self.model_chunks(Some(filter), chunk_size);
        let mut count = 0usize;
        while let Some(mut chunk) = chunks.next_chunk().await? {
            for instance in &mut chunk {
                let key = instance.primary_key_values();
                instance.apply_values(&patch)?;
                self.session.update(&key, instance).await?;
            }
            self.session.commit().await?;
            count += chunk.len();
            debug!(table = M::table_name(), count, "bulk_update committed chunk");
        }
        Ok(count)
    }

    /// Delete every record matching `filter`, issuing the deletions of a
    /// chunk concurrently. Does not commit.
    pub async fn bulk_delete(&self, filter: &Filter, chunk_size: u64) -> Result<usize, DataError> {
        let mut chunks = self.model_chunks(Some(filter), chunk_size).draining();
        let mut count = 0usize;
        while let Some(chunk) = chunks.next_chunk().await? {
            try_join_all(chunk.iter().map(|instance| self.session.delete(instance))).await?;
            count += chunk.len();
            debug!(table = M::table_name(), count, "bulk_delete staged chunk");
        }
        Ok(count)
    }
}

impl<M, S: Clone> Clone for DataService<M, S> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            _marker: PhantomData,
        }
    }
}
