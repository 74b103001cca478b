use crate::{AsyncRowSource, ColumnDesc, Result, Row, RowShape, RowSource, Value};
use std::{
    collections::VecDeque,
    future::{self, Future},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Result set held in memory.
#[derive(Debug, Clone)]
pub struct ResultSet {
    shape: RowShape,
    rows: VecDeque<Row>,
}

impl ResultSet {
    /// Columns as (name, type token) pairs.
    pub fn new(columns: &[(&str, Value)]) -> Self {
        Self::with_shape(
            columns
                .iter()
                .map(|(name, kind)| ColumnDesc::new(*name, kind.clone()))
                .collect(),
        )
    }

    pub fn with_shape(shape: RowShape) -> Self {
        Self {
            shape,
            rows: VecDeque::new(),
        }
    }

    pub fn row(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.push(values.into_iter().collect());
        self
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push_back(row);
    }

    pub fn shape(&self) -> &RowShape {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Observes a [`MemorySource`] after it was handed to a reader.
#[derive(Debug, Default, Clone)]
pub struct SourceProbe {
    closed: Arc<AtomicUsize>,
    cancelled: Arc<AtomicUsize>,
    rows: Arc<AtomicUsize>,
}

impl SourceProbe {
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::Relaxed)
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Rows handed out so far.
    pub fn rows(&self) -> usize {
        self.rows.load(Ordering::Relaxed)
    }
}

/// Row source over result sets already in memory, both blocking and async.
#[derive(Debug)]
pub struct MemorySource {
    current: Option<ResultSet>,
    rest: VecDeque<ResultSet>,
    probe: SourceProbe,
}

impl MemorySource {
    pub fn new(sets: impl IntoIterator<Item = ResultSet>) -> Self {
        let mut rest = sets.into_iter().collect::<VecDeque<_>>();
        Self {
            current: rest.pop_front(),
            rest,
            probe: SourceProbe::default(),
        }
    }

    pub fn probe(&self) -> SourceProbe {
        self.probe.clone()
    }
}

impl RowSource for MemorySource {
    fn shape(&self) -> RowShape {
        self.current
            .as_ref()
            .map(|v| v.shape.clone())
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        let row = self.current.as_mut().and_then(|v| v.rows.pop_front());
        if row.is_some() {
            self.probe.rows.fetch_add(1, Ordering::Relaxed);
        }
        Ok(row)
    }

    fn next_result(&mut self) -> Result<bool> {
        self.current = self.rest.pop_front();
        Ok(self.current.is_some())
    }

    fn cancel(&mut self) {
        self.probe.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    fn close(&mut self) -> Result<()> {
        self.probe.closed.fetch_add(1, Ordering::Relaxed);
        self.current = None;
        self.rest.clear();
        Ok(())
    }
}

impl AsyncRowSource for MemorySource {
    fn shape(&self) -> RowShape {
        RowSource::shape(self)
    }

    fn next_row(&mut self) -> impl Future<Output = Result<Option<Row>>> + Send {
        future::ready(RowSource::next_row(self))
    }

    fn next_result(&mut self) -> impl Future<Output = Result<bool>> + Send {
        future::ready(RowSource::next_result(self))
    }

    fn cancel(&mut self) {
        RowSource::cancel(self)
    }

    fn close(&mut self) -> impl Future<Output = Result<()>> + Send {
        future::ready(RowSource::close(self))
    }
}
