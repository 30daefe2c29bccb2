//! The run loop.
//!
//! A run stages input into the region, resets the scanner, and then calls
//! its step entry point until it reports a terminal status:
//!
//! 1. reject sizes that leave no room for the terminator
//! 2. let the caller fill the staging window, checking the reported count
//! 3. write the terminator
//! 4. call setup with the staging start
//! 5. step while the status is positive, translating and forwarding tokens
//! 6. fail on a negative status, succeed otherwise
//!
//! Runs on one bridge are serialized by `&mut self`. Share a bridge across
//! threads through [`SharedBridge`].

use crate::config::{BridgeConfig, DeliveryMode};
use crate::error::{BridgeError, Result};
use crate::region::RegionLayout;
use crate::scanner::{RawToken, Scanner};
use crate::status::StepStatus;
use crate::token::{OwnedToken, Token, TokenRecord};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::sync::Arc;
use tracing::instrument;

/// A bridge behind a lock, for hosts that share one instance between threads.
pub type SharedBridge<S> = Arc<Mutex<Bridge<S>>>;

/// Counters for a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Input bytes written by the prepare callback.
    pub written: usize,
    /// Step calls made.
    pub steps: u64,
    /// Tokens delivered to the sink.
    pub tokens: u64,
}

/// Owns a scanner and its region and drives runs over it.
pub struct Bridge<S> {
    scanner: S,
    layout: RegionLayout,
    config: BridgeConfig,
    runs: u64,
}

/// Per-run bookkeeping, reused across steps.
struct RunCursor {
    written: usize,
    steps: u64,
    tokens: u64,
    emitted: Vec<RawToken>,
    records: Vec<TokenRecord>,
}

impl RunCursor {
    fn summary(&self) -> RunSummary {
        RunSummary {
            written: self.written,
            steps: self.steps,
            tokens: self.tokens,
        }
    }
}

impl<S: Scanner> Bridge<S> {
    /// Wrap a scanner whose region matches `config`.
    pub fn new(scanner: S, config: BridgeConfig) -> Result<Self> {
        let layout = config.layout()?;
        let actual = scanner.memory().len();
        if actual != layout.capacity() {
            return Err(BridgeError::InvalidConfig {
                cause: format!(
                    "scanner region is {actual} bytes but the layout needs {}",
                    layout.capacity()
                ),
            });
        }

        Ok(Self {
            scanner,
            layout,
            config,
            runs: 0,
        })
    }

    /// Put the bridge behind a lock.
    pub fn shared(self) -> SharedBridge<S> {
        Arc::new(Mutex::new(self))
    }

    /// Region layout.
    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    /// Bridge configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The wrapped scanner.
    pub fn scanner(&self) -> &S {
        &self.scanner
    }

    /// The wrapped scanner, mutably.
    pub fn scanner_mut(&mut self) -> &mut S {
        &mut self.scanner
    }

    /// Number of runs that got past input validation.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    /// Unwrap the scanner.
    pub fn into_scanner(self) -> S {
        self.scanner
    }

    /// Scan `size` bytes of input produced by `prepare`, handing every token
    /// to `sink`.
    ///
    /// `prepare` receives exactly `size` writable bytes and returns how many
    /// it filled (`None` means all of them). Each [`Token`] borrows the
    /// region only for the duration of the sink call.
    #[instrument(level = "debug", skip_all, fields(run = self.runs + 1, size = size))]
    pub fn run<P, F>(&mut self, size: usize, prepare: P, mut sink: F) -> Result<RunSummary>
    where
        P: FnOnce(&mut [u8]) -> Option<usize>,
        F: FnMut(Token<'_>),
    {
        let mut cursor = self.begin(size, prepare)?;
        let result = match self.config.delivery {
            DeliveryMode::Streaming => self.drive(&mut cursor, &mut sink),
            DeliveryMode::Atomic => self.drive_atomic(&mut cursor, &mut sink),
        };

        match result {
            Ok(()) => {
                let summary = cursor.summary();
                tracing::debug!(
                    written = summary.written,
                    steps = summary.steps,
                    tokens = summary.tokens,
                    "Run complete"
                );
                Ok(summary)
            }
            Err(err) => {
                tracing::warn!(
                    code = err.code(),
                    steps = cursor.steps,
                    tokens = cursor.tokens,
                    error = %err,
                    "Run failed"
                );
                Err(err)
            }
        }
    }

    /// Scan a byte slice.
    pub fn run_bytes<F>(&mut self, input: &[u8], sink: F) -> Result<RunSummary>
    where
        F: FnMut(Token<'_>),
    {
        self.run(
            input.len(),
            |window| {
                window.copy_from_slice(input);
                None
            },
            sink,
        )
    }

    /// Scan a byte slice and copy out every token.
    pub fn collect(&mut self, input: &[u8]) -> Result<Vec<OwnedToken>> {
        let mut tokens = Vec::new();
        self.run_bytes(input, |token| tokens.push(token.into_owned()))?;
        Ok(tokens)
    }

    /// Stage input and return a lazy stream that steps the scanner on demand.
    ///
    /// Input validation, `prepare` and setup happen before this returns.
    /// Tokens are yielded one step at a time regardless of the delivery mode.
    pub fn tokens<P>(&mut self, size: usize, prepare: P) -> Result<TokenStream<'_, S>>
    where
        P: FnOnce(&mut [u8]) -> Option<usize>,
    {
        let cursor = self.begin(size, prepare)?;
        Ok(TokenStream {
            bridge: self,
            cursor,
            pending: VecDeque::new(),
            state: StreamState::Running,
        })
    }

    /// Lazy stream over a byte slice.
    pub fn tokens_from(&mut self, input: &[u8]) -> Result<TokenStream<'_, S>> {
        self.tokens(input.len(), |window| {
            window.copy_from_slice(input);
            None
        })
    }

    fn begin<P>(&mut self, size: usize, prepare: P) -> Result<RunCursor>
    where
        P: FnOnce(&mut [u8]) -> Option<usize>,
    {
        self.layout.check_input(size)?;

        let range = self.layout.staging_range(size);
        let capacity = self.layout.capacity();
        let memory = self.scanner.memory_mut();
        let window = memory
            .get_mut(range)
            .ok_or_else(|| BridgeError::InvalidConfig {
                cause: format!("scanner region no longer spans {capacity} bytes"),
            })?;

        let written = prepare(window).unwrap_or(size);
        if written > size {
            return Err(BridgeError::OverwriteViolation {
                written,
                requested: size,
            });
        }

        // check_input keeps the terminator inside the region.
        memory[self.layout.terminator_offset(written)] = 0;

        self.runs += 1;
        tracing::debug!(written, "Staged input");

        self.scanner.setup(self.layout.staging_start())?;

        Ok(RunCursor {
            written,
            steps: 0,
            tokens: 0,
            emitted: Vec::new(),
            records: Vec::new(),
        })
    }

    /// Make one step call and translate what it emitted into `cursor.records`.
    fn advance(&mut self, cursor: &mut RunCursor) -> Result<StepStatus> {
        if let Some(max) = self.config.max_steps {
            if cursor.steps >= max {
                return Err(BridgeError::StepLimitExceeded {
                    steps: cursor.steps,
                });
            }
        }

        cursor.emitted.clear();
        cursor.records.clear();

        let raw = self.scanner.step(&mut cursor.emitted)?;
        cursor.steps += 1;

        let staging_start = self.layout.staging_start();
        for token in cursor.emitted.drain(..) {
            cursor
                .records
                .push(token.relative_to(staging_start, cursor.written)?);
        }

        Ok(StepStatus::from_raw(raw))
    }

    fn text(&self, record: &TokenRecord, written: usize) -> Result<&[u8]> {
        let start = self.layout.staging_start() as usize;
        let range = record.range();
        self.scanner
            .memory()
            .get(start + range.start..start + range.end)
            .ok_or(BridgeError::TokenOutOfBounds {
                offset: i64::from(record.offset),
                len: record.len,
                written,
            })
    }

    fn drive<F>(&mut self, cursor: &mut RunCursor, sink: &mut F) -> Result<()>
    where
        F: FnMut(Token<'_>),
    {
        loop {
            let status = self.advance(cursor)?;

            for record in &cursor.records {
                let text = self.text(record, cursor.written)?;
                tracing::trace!(
                    offset = record.offset,
                    len = record.len,
                    line_no = record.line_no,
                    type_tag = record.type_tag,
                    "Token"
                );
                sink(Token::new(*record, text));
                cursor.tokens += 1;
            }

            match status {
                StepStatus::Continue(_) => {}
                StepStatus::Done => return Ok(()),
                StepStatus::Failed(code) => return Err(BridgeError::InternalScanner { code }),
            }
        }
    }

    fn drive_atomic<F>(&mut self, cursor: &mut RunCursor, sink: &mut F) -> Result<()>
    where
        F: FnMut(Token<'_>),
    {
        let mut buffered = Vec::new();
        let mut text = Vec::new();

        loop {
            let status = self.advance(cursor)?;

            for record in &cursor.records {
                let start = text.len();
                text.extend_from_slice(self.text(record, cursor.written)?);
                buffered.push((*record, start..text.len()));
            }

            match status {
                StepStatus::Continue(_) => {}
                StepStatus::Done => break,
                StepStatus::Failed(code) => return Err(BridgeError::InternalScanner { code }),
            }
        }

        for (record, span) in buffered {
            sink(Token::new(record, &text[span]));
            cursor.tokens += 1;
        }
        Ok(())
    }
}

enum StreamState {
    Running,
    Failed(BridgeError),
    Finished,
}

/// Tokens of one run, produced one step at a time.
///
/// Holds the bridge mutably until dropped, so no other run can start on it.
/// A negative scanner status is yielded as the final `Err` item, after the
/// tokens emitted by that step.
pub struct TokenStream<'b, S: Scanner> {
    bridge: &'b mut Bridge<S>,
    cursor: RunCursor,
    pending: VecDeque<OwnedToken>,
    state: StreamState,
}

impl<S: Scanner> TokenStream<'_, S> {
    /// Counters so far.
    pub fn summary(&self) -> RunSummary {
        self.cursor.summary()
    }

    /// Whether the scanner has reached a terminal status.
    pub fn is_finished(&self) -> bool {
        !matches!(self.state, StreamState::Running)
    }
}

impl<S: Scanner> Iterator for TokenStream<'_, S> {
    type Item = Result<OwnedToken>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Some(Ok(token));
            }

            match std::mem::replace(&mut self.state, StreamState::Finished) {
                StreamState::Finished => return None,
                StreamState::Failed(err) => return Some(Err(err)),
                StreamState::Running => {}
            }

            let status = match self.bridge.advance(&mut self.cursor) {
                Ok(status) => status,
                Err(err) => return Some(Err(err)),
            };

            for record in &self.cursor.records {
                match self.bridge.text(record, self.cursor.written) {
                    Ok(text) => self
                        .pending
                        .push_back(Token::new(*record, text).into_owned()),
                    Err(err) => {
                        self.pending.clear();
                        return Some(Err(err));
                    }
                }
            }
            self.cursor.tokens += self.cursor.records.len() as u64;

            self.state = match status {
                StepStatus::Continue(_) => StreamState::Running,
                StepStatus::Done => StreamState::Finished,
                StepStatus::Failed(code) => {
                    StreamState::Failed(BridgeError::InternalScanner { code })
                }
            };
        }
    }
}

impl<S: Scanner> FusedIterator for TokenStream<'_, S> {}
