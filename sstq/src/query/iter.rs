//! Lazy result iteration with three consumption modes: whole-result
//! materialization, fixed-size chunks, and single rows.

use std::time::{Duration, Instant};

use crate::{
    error::{Error, ErrorCode, Result},
    query::ast::OrderDirection,
    query::exec::{eval_clause, project, QueryPlan},
    sstable::data::{Row, Scan, ScanSummary},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NotStarted,
    Reading,
    Finished,
}

enum Source {
    Stream(Scan),
    Buffered(std::vec::IntoIter<Row>),
    /// Terminal: the file buffer is released.
    Done,
}

/// Row source over one scan. Terminal after end of data, the LIMIT bound, an
/// expired timeout or a propagated error; a finished iterator stays finished.
pub struct QueryIterator {
    state: State,
    source: Source,
    plan: QueryPlan,
    yielded: usize,
    skipped: usize,
    deadline: Option<Instant>,
    summary: Option<ScanSummary>,
}

impl QueryIterator {
    pub(crate) fn new(scan: Scan, plan: QueryPlan) -> Self {
        Self {
            state: State::NotStarted,
            source: Source::Stream(scan),
            plan,
            yielded: 0,
            skipped: 0,
            deadline: None,
            summary: None,
        }
    }

    /// Fail with `Timeout` once `timeout` has elapsed, checked at row
    /// boundaries. The clock starts now, not at the first row.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Scan counters, available once the underlying scan has completed.
    pub fn scan_summary(&self) -> Option<ScanSummary> {
        self.summary
    }

    /// Up to `chunk_size` rows; `None` once the result set is exhausted.
    pub fn next_chunk(&mut self, chunk_size: usize) -> Result<Option<Vec<Row>>> {
        if chunk_size == 0 {
            return Err(Error::new(
                ErrorCode::Internal,
                "chunk size must be positive",
            ));
        }
        let mut chunk = Vec::new();
        while chunk.len() < chunk_size {
            match self.next_row()? {
                Some(row) => chunk.push(row),
                None => break,
            }
        }
        if chunk.is_empty() {
            return Ok(None);
        }
        Ok(Some(chunk))
    }

    /// Next projected row, or `None` when exhausted.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        match self.advance() {
            Ok(Some(row)) => Ok(Some(project(&row, &self.plan.projection))),
            Ok(None) => Ok(None),
            Err(err) => {
                self.finish();
                Err(err)
            }
        }
    }

    fn advance(&mut self) -> Result<Option<Row>> {
        loop {
            match self.state {
                State::Finished => return Ok(None),
                State::NotStarted => self.prepare()?,
                State::Reading => {}
            }
            if self.plan.limit.is_some_and(|limit| self.yielded >= limit) {
                self.finish();
                return Ok(None);
            }
            self.check_deadline()?;

            let row = match &mut self.source {
                Source::Stream(scan) => scan.next_row()?,
                Source::Buffered(rows) => rows.next(),
                Source::Done => None,
            };
            let Some(row) = row else {
                self.finish();
                return Ok(None);
            };

            if let Some(filter) = &self.plan.filter {
                if !eval_clause(filter, &row) {
                    continue;
                }
            }
            if self.skipped < self.plan.offset {
                self.skipped += 1;
                continue;
            }
            self.yielded += 1;
            return Ok(Some(row));
        }
    }

    /// ORDER BY cannot stream: every matched row is buffered and sorted
    /// before the first one is returned.
    fn prepare(&mut self) -> Result<()> {
        self.state = State::Reading;
        if self.plan.order_by.is_empty() {
            return Ok(());
        }
        if self.plan.limit.is_none() {
            tracing::warn!("ORDER BY without LIMIT buffers the entire matched row set");
        }

        let Source::Stream(mut scan) = std::mem::replace(&mut self.source, Source::Done) else {
            return Ok(());
        };
        let mut rows = Vec::new();
        loop {
            self.check_deadline()?;
            let Some(row) = scan.next_row()? else { break };
            if let Some(filter) = &self.plan.filter {
                if !eval_clause(filter, &row) {
                    continue;
                }
            }
            rows.push(row);
        }
        self.summary = Some(scan.summary());

        let order_by = self.plan.order_by.clone();
        rows.sort_by(|a, b| {
            for order in &order_by {
                let left = a.get(&order.column);
                let right = b.get(&order.column);
                let ordering = match (left, right) {
                    (Some(l), Some(r)) => l.compare(r),
                    (l, r) => l.cmp(&r),
                };
                let ordering = match order.direction {
                    OrderDirection::Asc => ordering,
                    OrderDirection::Desc => ordering.reverse(),
                };
                if !ordering.is_eq() {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });
        self.source = Source::Buffered(rows.into_iter());
        Ok(())
    }

    fn check_deadline(&self) -> Result<()> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::new(ErrorCode::Timeout, "query deadline exceeded"));
            }
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.state = State::Finished;
        if let Source::Stream(scan) = &self.source {
            self.summary = Some(scan.summary());
        }
        self.source = Source::Done;
    }
}

impl Iterator for QueryIterator {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

/// Adapter yielding fixed-size chunks, the last one possibly short.
pub struct Chunks {
    iter: QueryIterator,
    chunk_size: usize,
}

impl Chunks {
    pub(crate) fn new(iter: QueryIterator, chunk_size: usize) -> Self {
        Self { iter, chunk_size }
    }

    pub fn scan_summary(&self) -> Option<ScanSummary> {
        self.iter.scan_summary()
    }
}

impl Iterator for Chunks {
    type Item = Result<Vec<Row>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next_chunk(self.chunk_size).transpose()
    }
}
