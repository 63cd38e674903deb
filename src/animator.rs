//! Word-by-word reveal of an answer.
//!
//! `Typewriter` holds the words still to show; `ScheduledTask` is the
//! repeating timer that drives it. The timer never touches chat state itself,
//! it only calls back so the owner can post an event to the UI loop.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Reveal state for one message.
#[derive(Debug, Clone)]
pub struct Typewriter {
    target: usize,
    words: VecDeque<String>,
    started: bool,
}

impl Typewriter {
    /// Words are split on single spaces, so line breaks inside the answer
    /// travel with the word they are attached to.
    pub fn new(text: &str, target: usize) -> Self {
        Self {
            target,
            words: text.split(' ').map(str::to_string).collect(),
            started: false,
        }
    }

    /// Index of the message being revealed.
    pub fn target(&self) -> usize {
        self.target
    }

    pub fn remaining(&self) -> usize {
        self.words.len()
    }

    /// Append the next word to `out`. Returns `true` once nothing is left.
    pub fn step(&mut self, out: &mut String) -> bool {
        if let Some(word) = self.words.pop_front() {
            if self.started {
                out.push(' ');
            }
            out.push_str(&word);
            self.started = true;
        }
        self.words.is_empty()
    }
}

/// A repeating callback on the tokio runtime that stops when cancelled,
/// dropped, or when the callback returns `false`.
#[derive(Debug)]
pub struct ScheduledTask {
    token: CancellationToken,
}

impl ScheduledTask {
    /// Call `on_tick` every `period`, first call one period from now.
    pub fn every<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let period = period.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        if !on_tick() {
                            break;
                        }
                    }
                }
            }
        });

        Self { token }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn reveal_all(text: &str) -> (String, usize) {
        let mut tw = Typewriter::new(text, 0);
        let mut out = String::new();
        let mut ticks = 0;
        loop {
            ticks += 1;
            if tw.step(&mut out) {
                break;
            }
        }
        (out, ticks)
    }

    #[test]
    fn test_reveals_one_word_per_step() {
        let mut tw = Typewriter::new("Hello big world", 3);
        let mut out = String::new();
        assert_eq!(tw.target(), 3);
        assert!(!tw.step(&mut out));
        assert_eq!(out, "Hello");
        assert!(!tw.step(&mut out));
        assert_eq!(out, "Hello big");
        assert!(tw.step(&mut out));
        assert_eq!(out, "Hello big world");
        assert_eq!(tw.remaining(), 0);
    }

    #[test]
    fn test_full_reveal_matches_input() {
        let text = "Line one\nline two  with double space";
        let (out, ticks) = reveal_all(text);
        assert_eq!(out, text);
        assert_eq!(ticks, text.split(' ').count());
    }

    #[test]
    fn test_empty_text_finishes_in_one_step() {
        let (out, ticks) = reveal_all("");
        assert_eq!(out, "");
        assert_eq!(ticks, 1);
    }

    #[tokio::test]
    async fn test_scheduled_task_stops_when_callback_declines() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let _task = ScheduledTask::every(Duration::from_millis(1), move || {
            seen.fetch_add(1, Ordering::SeqCst) < 2
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_dropping_task_cancels_it() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let task = ScheduledTask::every(Duration::from_millis(1), move || {
            seen.fetch_add(1, Ordering::SeqCst);
            true
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        task.cancel();
        assert!(task.is_cancelled());
        drop(task);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let after_cancel = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_cancel);
    }
}
