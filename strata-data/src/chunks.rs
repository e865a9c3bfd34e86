use futures_util::stream::{self, Stream};

use crate::error::DataError;
use crate::filter::Filter;
use crate::model::Model;
use crate::pagination::Pagination;
use crate::service::DataService;
use crate::session::Session;
use crate::value::Value;

/// Pull-based iterator over a filtered record set, one page per call.
///
/// Each [`next_chunk`](ModelChunks::next_chunk) fetches one page of
/// `chunk_size + 1` rows: the extra row only tells whether another page
/// exists and is never yielded. Nothing is fetched ahead of the consumer.
///
/// Paging is offset-based. Rows inserted or deleted by other sessions
/// between two calls can be skipped or seen twice.
///
/// ```ignore
/// let mut chunks = service.model_chunks(Some(&filter), 100);
/// while let Some(chunk) = chunks.next_chunk().await? {
///     for item in chunk {
///         // ...
///     }
/// }
/// ```
pub struct ModelChunks<'a, M, S> {
    service: &'a DataService<M, S>,
    filter: Option<Filter>,
    pagination: Pagination,
    draining: bool,
    finished: bool,
    previous_keys: Vec<Vec<Value>>,
}

impl<'a, M: Model, S: Session> ModelChunks<'a, M, S> {
    pub(crate) fn new(service: &'a DataService<M, S>, filter: Option<&Filter>, chunk_size: u64) -> Self {
        Self {
            service,
            filter: filter.cloned(),
            pagination: Pagination::new(1, chunk_size).with_fetch_one_more(true),
            draining: false,
            finished: false,
            previous_keys: Vec::new(),
        }
    }

    /// Always read the first page.
    ///
    /// For consumers that remove every yielded record from the matching set
    /// through the same session, so the next chunk is again the first page.
    /// A page that still contains a record of the previous chunk fails
    /// instead of looping forever.
    pub(crate) fn draining(mut self) -> Self {
        self.draining = true;
        self
    }

    pub fn chunk_size(&self) -> u64 {
        self.pagination.page_size()
    }

    /// Fetch the next chunk, or `None` once the set is exhausted.
    ///
    /// Chunks are never empty.
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<M>>, DataError> {
        if self.finished {
            return Ok(None);
        }

        let mut chunk = match self
            .service
            .search(self.filter.as_ref(), None, Some(&self.pagination))
            .await
        {
            Ok(chunk) => chunk,
            Err(err) => {
                self.finished = true;
                return Err(err);
            }
        };

        let size = usize::try_from(self.chunk_size()).unwrap_or(usize::MAX);
        let has_next = chunk.len() > size;
        if has_next {
            chunk.truncate(size);
        } else {
            self.finished = true;
        }

        if self.draining {
            let keys: Vec<Vec<Value>> = chunk.iter().map(M::primary_key_values).collect();
            if keys.iter().any(|k| self.previous_keys.contains(k)) {
                self.finished = true;
                return Err(DataError::Other(format!(
                    "records of '{}' still visible after removal; the session must expose its own writes",
                    M::table_name()
                )));
            }
            self.previous_keys = keys;
        } else {
            self.pagination = self.pagination.with_page(self.pagination.page() + 1);
        }

        if chunk.is_empty() {
            return Ok(None);
        }
        Ok(Some(chunk))
    }

    /// Turn the iterator into a `Stream` of chunks. The stream ends after
    /// the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<M>, DataError>> + 'a
    where
        S: 'a,
    {
        stream::try_unfold(self, |mut chunks| async move {
            Ok(chunks.next_chunk().await?.map(|chunk| (chunk, chunks)))
        })
    }
}
