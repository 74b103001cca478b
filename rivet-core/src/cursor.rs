use crate::{
    AsyncRowSource, ColumnDesc, CommandIdentity, Error, ErrorAction, FromRow, FromRowSet, Mapper,
    MapperState, MappingError, Materializer, Relator, Result, Row, RowSetReader, RowSource,
    truncate_long,
};
use async_stream::stream;
use futures::{Stream, StreamExt, TryStreamExt, pin_mut};
use std::{marker::PhantomData, sync::Arc};

/// Position of a cursor over the result sets of one command.
///
/// Moves strictly forward: every result set is read once, in order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CursorState {
    /// Index of the current result set.
    pub index: usize,
    /// Whether a read of the current result set already started.
    pub consumed: bool,
    /// No result set is left.
    pub exhausted: bool,
}

impl CursorState {
    fn claim(&mut self, disposed: bool) -> Result<()> {
        if disposed {
            return Err(MappingError::CursorDisposed.into());
        }
        if self.exhausted {
            return Err(MappingError::NoMoreResults.into());
        }
        if self.consumed {
            return Err(MappingError::ResultConsumed { index: self.index }.into());
        }
        self.consumed = true;
        Ok(())
    }
}

/// Turns the rows of one result set into items.
trait RowStep {
    type Item;
    /// `None` when the row produced nothing yet.
    fn row(&mut self, row: Row) -> Result<Option<Self::Item>>;
    /// Called once after the last row.
    fn finish(&mut self) -> Option<Self::Item> {
        None
    }
}

struct Single<T> {
    materializer: Arc<dyn Materializer>,
    _marker: PhantomData<fn() -> T>,
}

fn single<T: FromRow>(
    state: &MapperState,
    command: &CommandIdentity,
    shape: &[ColumnDesc],
) -> Result<Single<T>> {
    Ok(Single {
        materializer: state.materializer::<T>(command, shape, 0)?,
        _marker: PhantomData,
    })
}

impl<T: FromRow> RowStep for Single<T> {
    type Item = T;
    fn row(&mut self, mut row: Row) -> Result<Option<T>> {
        self.materializer.materialize(&mut row)?.downcast().map(Some)
    }
}

struct Combined<S, F> {
    reader: RowSetReader<S>,
    combine: F,
}

impl<S: FromRowSet, R, F: FnMut(S) -> R> RowStep for Combined<S, F> {
    type Item = R;
    fn row(&mut self, row: Row) -> Result<Option<R>> {
        Ok(Some((self.combine)(self.reader.read(row)?)))
    }
}

struct Joined<S> {
    reader: RowSetReader<S>,
}

impl<S: FromRowSet> RowStep for Joined<S> {
    type Item = S::First;
    fn row(&mut self, row: Row) -> Result<Option<S::First>> {
        self.reader.read_joined(row).map(Some)
    }
}

struct Related<S, R, F> {
    reader: RowSetReader<S>,
    relator: Relator<S, R, F>,
}

impl<S: FromRowSet, R, F: FnMut(S) -> Option<R>> RowStep for Related<S, R, F> {
    type Item = R;
    fn row(&mut self, row: Row) -> Result<Option<R>> {
        Ok(self.relator.on_row(self.reader.read(row)?))
    }
    fn finish(&mut self) -> Option<R> {
        self.relator.finish()
    }
}

#[derive(Default)]
struct Progress {
    done: bool,
    /// Reported by the next call.
    pending: Option<Error>,
}

/// Blocking cursor over the result sets produced by one command.
///
/// Each read consumes the current result set, the cursor moves to the next one once the rows
/// are exhausted or the iterator is dropped. Dropping the reader disposes it.
pub struct GridReader<S: RowSource> {
    source: Option<S>,
    mapper: Arc<Mapper>,
    command: CommandIdentity,
    state: CursorState,
    disposed: bool,
}

impl<S: RowSource> GridReader<S> {
    pub fn new(source: S, mapper: Arc<Mapper>, command: CommandIdentity) -> Self {
        Self {
            source: Some(source),
            mapper,
            command,
            state: CursorState::default(),
            disposed: false,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn command(&self) -> &CommandIdentity {
        &self.command
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Rows of the current result set read as `T`.
    pub fn read<T: FromRow>(&mut self) -> Result<impl Iterator<Item = Result<T>>> {
        self.begin(single::<T>)
    }

    /// Reads the current result set into a vector.
    pub fn read_all<T: FromRow>(&mut self) -> Result<Vec<T>> {
        self.read::<T>()?.collect()
    }

    /// First row of the current result set, the others are skipped.
    pub fn read_first<T: FromRow>(&mut self) -> Result<Option<T>> {
        let mut rows = self.read::<T>()?;
        rows.next().transpose()
    }

    /// Rows split into the parts of `M`.
    pub fn read_set<M: FromRowSet>(&mut self) -> Result<impl Iterator<Item = Result<M>>> {
        self.read_multi(|set: M| set)
    }

    /// Rows split into the parts of `M`, combined by `combine`.
    pub fn read_multi<M: FromRowSet, R>(
        &mut self,
        combine: impl FnMut(M) -> R,
    ) -> Result<impl Iterator<Item = Result<R>>> {
        self.begin(move |state, command, shape| {
            Ok(Combined {
                reader: RowSetReader::<M>::new(state, command, shape)?,
                combine,
            })
        })
    }

    /// Rows split into the parts of `M`, each part assigned to the field of a preceding part
    /// that holds its type.
    pub fn read_joined<M: FromRowSet>(
        &mut self,
    ) -> Result<impl Iterator<Item = Result<M::First>>> {
        self.begin(|state, command, shape| {
            Ok(Joined {
                reader: RowSetReader::<M>::joined(state, command, shape)?,
            })
        })
    }

    /// Rows split into the parts of `M` and handed to `relate`, which answers `None` while it
    /// accumulates. See [`Relator`].
    pub fn read_related<M: FromRowSet, R>(
        &mut self,
        relate: impl FnMut(M) -> Option<R>,
    ) -> Result<impl Iterator<Item = Result<R>>> {
        self.begin(move |state, command, shape| {
            Ok(Related {
                reader: RowSetReader::<M>::new(state, command, shape)?,
                relator: Relator::new(relate),
            })
        })
    }

    /// Cancels the command if rows are left and releases the source. Safe to call more than once.
    pub fn dispose(&mut self) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        if !self.state.exhausted {
            if let Some(source) = self.source.as_mut() {
                source.cancel();
            }
        }
        self.release()
    }

    fn begin<P: RowStep>(
        &mut self,
        step: impl FnOnce(&MapperState, &CommandIdentity, &[ColumnDesc]) -> Result<P>,
    ) -> Result<Rows<'_, S, P>> {
        self.state.claim(self.disposed)?;
        let shape = self.source_mut()?.shape();
        let snapshot = self.mapper.snapshot();
        match step(&snapshot, &self.command, &shape) {
            Ok(step) => Ok(Rows {
                reader: self,
                step,
                progress: Progress::default(),
            }),
            Err(error) => {
                if let Err(e) = self.advance() {
                    log::warn!("Could not skip result set {}: {e:#}", self.state.index);
                }
                Err(error)
            }
        }
    }

    fn source_mut(&mut self) -> Result<&mut S> {
        self.source
            .as_mut()
            .ok_or_else(|| MappingError::CursorDisposed.into())
    }

    fn advance(&mut self) -> Result<()> {
        if self.state.exhausted {
            return Ok(());
        }
        let Some(source) = self.source.as_mut() else {
            return Ok(());
        };
        if source.next_result()? {
            self.state.index += 1;
            self.state.consumed = false;
            Ok(())
        } else {
            self.state.exhausted = true;
            log::debug!(
                "All {} result sets read: {}",
                self.state.index + 1,
                truncate_long!(self.command.sql)
            );
            self.release()
        }
    }

    fn release(&mut self) -> Result<()> {
        match self.source.take() {
            Some(mut source) => source.close(),
            None => Ok(()),
        }
    }
}

impl<S: RowSource> Drop for GridReader<S> {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            log::error!("{e:#}");
        }
    }
}

struct Rows<'a, S: RowSource, P: RowStep> {
    reader: &'a mut GridReader<S>,
    step: P,
    progress: Progress,
}

impl<S: RowSource, P: RowStep> Rows<'_, S, P> {
    fn end(&mut self) {
        self.progress.done = true;
        if let Err(e) = self.reader.advance() {
            self.progress.pending = Some(e);
        }
    }

    fn fail(&mut self, error: Error) -> Option<Result<P::Item>> {
        let action = self.reader.mapper.handle_error(&error);
        self.end();
        match action {
            ErrorAction::Propagate => Some(Err(error)),
            ErrorAction::Stop => {
                log::debug!("Stopped reading result set: {error:#}");
                self.progress.pending.take().map(Err)
            }
        }
    }
}

impl<S: RowSource, P: RowStep> Iterator for Rows<'_, S, P> {
    type Item = Result<P::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.progress.pending.take() {
            return Some(Err(e));
        }
        if self.progress.done {
            return None;
        }
        loop {
            let row = match self.reader.source_mut().and_then(|s| s.next_row()) {
                Ok(Some(row)) => row,
                Ok(None) => {
                    let tail = self.step.finish();
                    self.end();
                    return match tail {
                        Some(v) => Some(Ok(v)),
                        None => self.progress.pending.take().map(Err),
                    };
                }
                Err(e) => return self.fail(e),
            };
            match self.step.row(row) {
                Ok(Some(v)) => return Some(Ok(v)),
                Ok(None) => continue,
                Err(e) => return self.fail(e),
            }
        }
    }
}

impl<S: RowSource, P: RowStep> Drop for Rows<'_, S, P> {
    fn drop(&mut self) {
        if !self.progress.done {
            self.end();
        }
        if let Some(e) = self.progress.pending.take() {
            log::error!("{e:#}");
        }
    }
}

/// Suspend capable counterpart of [`GridReader`], reads yield streams.
///
/// A stream dropped before its end leaves the move to the next result set pending, it happens
/// at the next read or at disposal. Call [`AsyncGridReader::dispose`] to release the source,
/// dropping the reader only cancels it.
pub struct AsyncGridReader<S: AsyncRowSource> {
    source: Option<S>,
    mapper: Arc<Mapper>,
    command: CommandIdentity,
    state: CursorState,
    disposed: bool,
    pending_advance: bool,
}

impl<S: AsyncRowSource> AsyncGridReader<S> {
    pub fn new(source: S, mapper: Arc<Mapper>, command: CommandIdentity) -> Self {
        Self {
            source: Some(source),
            mapper,
            command,
            state: CursorState::default(),
            disposed: false,
            pending_advance: false,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn command(&self) -> &CommandIdentity {
        &self.command
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub async fn read<T: FromRow>(&mut self) -> Result<impl Stream<Item = Result<T>>> {
        let step = self.begin(single::<T>).await?;
        Ok(self.rows(step))
    }

    pub async fn read_all<T: FromRow>(&mut self) -> Result<Vec<T>> {
        self.read::<T>().await?.try_collect().await
    }

    pub async fn read_first<T: FromRow>(&mut self) -> Result<Option<T>> {
        let rows = self.read::<T>().await?;
        pin_mut!(rows);
        rows.next().await.transpose()
    }

    pub async fn read_set<M: FromRowSet>(&mut self) -> Result<impl Stream<Item = Result<M>>> {
        self.read_multi(|set: M| set).await
    }

    pub async fn read_multi<M: FromRowSet, R>(
        &mut self,
        combine: impl FnMut(M) -> R,
    ) -> Result<impl Stream<Item = Result<R>>> {
        let step = self
            .begin(move |state, command, shape| {
                Ok(Combined {
                    reader: RowSetReader::<M>::new(state, command, shape)?,
                    combine,
                })
            })
            .await?;
        Ok(self.rows(step))
    }

    pub async fn read_joined<M: FromRowSet>(
        &mut self,
    ) -> Result<impl Stream<Item = Result<M::First>>> {
        let step = self
            .begin(|state, command, shape| {
                Ok(Joined {
                    reader: RowSetReader::<M>::joined(state, command, shape)?,
                })
            })
            .await?;
        Ok(self.rows(step))
    }

    pub async fn read_related<M: FromRowSet, R>(
        &mut self,
        relate: impl FnMut(M) -> Option<R>,
    ) -> Result<impl Stream<Item = Result<R>>> {
        let step = self
            .begin(move |state, command, shape| {
                Ok(Related {
                    reader: RowSetReader::<M>::new(state, command, shape)?,
                    relator: Relator::new(relate),
                })
            })
            .await?;
        Ok(self.rows(step))
    }

    /// Cancels the command if rows are left and releases the source. Safe to call more than once.
    pub async fn dispose(&mut self) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        self.pending_advance = false;
        if !self.state.exhausted {
            if let Some(source) = self.source.as_mut() {
                source.cancel();
            }
        }
        self.release().await
    }

    async fn begin<P: RowStep>(
        &mut self,
        step: impl FnOnce(&MapperState, &CommandIdentity, &[ColumnDesc]) -> Result<P>,
    ) -> Result<P> {
        if self.pending_advance && !self.disposed {
            self.advance().await?;
        }
        self.state.claim(self.disposed)?;
        // Settled by the stream once it ends, or by the next read
        self.pending_advance = true;
        let shape = self.source_mut()?.shape();
        let snapshot = self.mapper.snapshot();
        step(&snapshot, &self.command, &shape)
    }

    fn rows<P: RowStep>(&mut self, mut step: P) -> impl Stream<Item = Result<P::Item>> {
        stream! {
            let mut progress = Progress::default();
            while let Some(item) = self.next_item(&mut step, &mut progress).await {
                yield item;
            }
        }
    }

    async fn next_item<P: RowStep>(
        &mut self,
        step: &mut P,
        progress: &mut Progress,
    ) -> Option<Result<P::Item>> {
        if let Some(e) = progress.pending.take() {
            return Some(Err(e));
        }
        if progress.done {
            return None;
        }
        loop {
            let row = match self.next_row().await {
                Ok(Some(row)) => row,
                Ok(None) => {
                    let tail = step.finish();
                    self.end(progress).await;
                    return match tail {
                        Some(v) => Some(Ok(v)),
                        None => progress.pending.take().map(Err),
                    };
                }
                Err(e) => return self.fail(e, progress).await,
            };
            match step.row(row) {
                Ok(Some(v)) => return Some(Ok(v)),
                Ok(None) => continue,
                Err(e) => return self.fail(e, progress).await,
            }
        }
    }

    async fn end(&mut self, progress: &mut Progress) {
        progress.done = true;
        if let Err(e) = self.advance().await {
            progress.pending = Some(e);
        }
    }

    async fn fail<T>(&mut self, error: Error, progress: &mut Progress) -> Option<Result<T>> {
        let action = self.mapper.handle_error(&error);
        self.end(progress).await;
        match action {
            ErrorAction::Propagate => Some(Err(error)),
            ErrorAction::Stop => {
                log::debug!("Stopped reading result set: {error:#}");
                progress.pending.take().map(Err)
            }
        }
    }

    async fn next_row(&mut self) -> Result<Option<Row>> {
        self.source_mut()?.next_row().await
    }

    fn source_mut(&mut self) -> Result<&mut S> {
        self.source
            .as_mut()
            .ok_or_else(|| MappingError::CursorDisposed.into())
    }

    async fn advance(&mut self) -> Result<()> {
        self.pending_advance = false;
        if self.state.exhausted {
            return Ok(());
        }
        let Some(source) = self.source.as_mut() else {
            return Ok(());
        };
        if source.next_result().await? {
            self.state.index += 1;
            self.state.consumed = false;
            Ok(())
        } else {
            self.state.exhausted = true;
            log::debug!(
                "All {} result sets read: {}",
                self.state.index + 1,
                truncate_long!(self.command.sql)
            );
            self.release().await
        }
    }

    async fn release(&mut self) -> Result<()> {
        match self.source.take() {
            Some(mut source) => source.close().await,
            None => Ok(()),
        }
    }
}

impl<S: AsyncRowSource> Drop for AsyncGridReader<S> {
    fn drop(&mut self) {
        if self.disposed {
            return;
        }
        if let Some(source) = self.source.as_mut() {
            source.cancel();
            log::warn!(
                "Grid reader dropped before disposal, the command was cancelled: {}",
                truncate_long!(self.command.sql)
            );
        }
    }
}
