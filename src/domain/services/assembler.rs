#[cfg(test)]
#[path = "assembler_test.rs"]
mod tests;

use std::collections::VecDeque;

use futures::stream;
use futures::Stream;
use futures::StreamExt;

use crate::domain::models::Fragment;
use crate::domain::models::THINKING_CLOSE;
use crate::domain::models::THINKING_CLOSE_FINAL;
use crate::domain::models::THINKING_OPEN;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssemblerState {
    OutsideReasoning,
    InsideReasoning,
}

/// The two texts produced from one streamed response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssembledResponse {
    /// Answer text with reasoning fenced in a thinking block.
    pub display: String,
    /// Answer text only, suitable for resubmission to a model.
    pub canonical: String,
}

/// Turns a stream of fragments into display and canonical text. Each call to
/// `push` returns the display pieces emitted for that fragment so callers can
/// render output as it arrives.
pub struct ResponseAssembler {
    state: AssemblerState,
    display: String,
    canonical: String,
}

impl Default for ResponseAssembler {
    fn default() -> ResponseAssembler {
        return ResponseAssembler {
            state: AssemblerState::OutsideReasoning,
            display: "".to_string(),
            canonical: "".to_string(),
        };
    }
}

impl ResponseAssembler {
    pub fn state(&self) -> AssemblerState {
        return self.state;
    }

    fn emit(&mut self, pieces: &mut Vec<String>, text: &str) {
        self.display += text;
        pieces.push(text.to_string());
    }

    pub fn push(&mut self, fragment: Fragment) -> Vec<String> {
        let mut pieces: Vec<String> = vec![];

        match fragment {
            Fragment::Reasoning(text) => {
                if text.is_empty() {
                    return pieces;
                }
                if self.state == AssemblerState::OutsideReasoning {
                    self.emit(&mut pieces, THINKING_OPEN);
                    self.state = AssemblerState::InsideReasoning;
                }
                self.emit(&mut pieces, &text);
            }
            Fragment::Text(text) => {
                if text.is_empty() {
                    return pieces;
                }
                if self.state == AssemblerState::InsideReasoning {
                    self.emit(&mut pieces, THINKING_CLOSE);
                    self.state = AssemblerState::OutsideReasoning;
                }
                self.emit(&mut pieces, &text);
                self.canonical += &text;
            }
        }

        return pieces;
    }

    pub fn push_all(&mut self, fragments: Vec<Fragment>) -> Vec<String> {
        return fragments
            .into_iter()
            .flat_map(|fragment| return self.push(fragment))
            .collect();
    }

    /// Ends the response, closing a reasoning block left open by the backend.
    /// Safe to call more than once.
    pub fn finish(&mut self) -> Vec<String> {
        let mut pieces: Vec<String> = vec![];
        if self.state == AssemblerState::InsideReasoning {
            self.emit(&mut pieces, THINKING_CLOSE_FINAL);
            self.state = AssemblerState::OutsideReasoning;
        }

        return pieces;
    }

    pub fn into_response(mut self) -> AssembledResponse {
        self.finish();
        return AssembledResponse {
            display: self.display,
            canonical: self.canonical,
        };
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssemblerOutput {
    Piece(String),
    Done(AssembledResponse),
}

struct StreamState<S> {
    fragments: S,
    assembler: Option<ResponseAssembler>,
    pending: VecDeque<AssemblerOutput>,
}

/// Stream form of `ResponseAssembler`: yields display pieces as fragments
/// arrive, followed by a single `AssemblerOutput::Done` with both texts.
pub fn assemble_stream<S>(fragments: S) -> impl Stream<Item = AssemblerOutput>
where
    S: Stream<Item = Fragment> + Unpin,
{
    let state = StreamState {
        fragments,
        assembler: Some(ResponseAssembler::default()),
        pending: VecDeque::new(),
    };

    return stream::unfold(state, |mut state| async move {
        loop {
            if let Some(output) = state.pending.pop_front() {
                return Some((output, state));
            }

            let mut assembler = state.assembler.take()?;
            match state.fragments.next().await {
                Some(fragment) => {
                    let pieces = assembler.push(fragment);
                    state
                        .pending
                        .extend(pieces.into_iter().map(AssemblerOutput::Piece));
                    state.assembler = Some(assembler);
                }
                None => {
                    let pieces = assembler.finish();
                    state
                        .pending
                        .extend(pieces.into_iter().map(AssemblerOutput::Piece));
                    state
                        .pending
                        .push_back(AssemblerOutput::Done(assembler.into_response()));
                }
            }
        }
    });
}
