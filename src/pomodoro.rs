//! Pomodoro focus/break cycle.
//!
//! The timer is driven by calling [`PomodoroTimer::tick`] once per second.
//! Finishing a focus phase hands back the session to append to the log.

use serde::{Deserialize, Serialize};

use crate::models::{LinkedType, NewSession};
use crate::settings::Setting;
use crate::utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PomodoroConfig {
    #[serde(rename = "focus", default = "default_focus")]
    pub focus_minutes: u32,
    #[serde(rename = "short_break", default = "default_short_break")]
    pub short_break_minutes: u32,
    #[serde(rename = "long_break", default = "default_long_break")]
    pub long_break_minutes: u32,
    #[serde(rename = "cycles", default = "default_cycles")]
    pub cycles_before_long_break: u32,
}

impl Default for PomodoroConfig {
    fn default() -> Self {
        Self {
            focus_minutes: default_focus(),
            short_break_minutes: default_short_break(),
            long_break_minutes: default_long_break(),
            cycles_before_long_break: default_cycles(),
        }
    }
}

impl Setting for PomodoroConfig {
    const KEY: &'static str = "pomodoro";
}

/// Minutes to seconds; u64 holds any u32 minute count
fn to_seconds(minutes: u32) -> u64 {
    u64::from(minutes) * 60
}

fn default_focus() -> u32 {
    25
}

fn default_short_break() -> u32 {
    5
}

fn default_long_break() -> u32 {
    15
}

fn default_cycles() -> u32 {
    4
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Focus,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Focus => "focus",
            Phase::ShortBreak => "short break",
            Phase::LongBreak => "long break",
        }
    }
}

/// Result of a single tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// Seconds left in the current phase
    Remaining(u64),
    /// The phase ended; `session` is set when a focus phase finished
    Completed { next: Phase, session: Option<NewSession> },
}

#[derive(Debug, Clone)]
pub struct PomodoroTimer {
    config: PomodoroConfig,
    phase: Phase,
    remaining: u64,
    cycles: u32,
    running: bool,
    linked_type: LinkedType,
    linked_id: Option<String>,
    focus_started_at: Option<String>,
}

impl PomodoroTimer {
    pub fn new(config: PomodoroConfig) -> Self {
        Self {
            config,
            phase: Phase::Focus,
            remaining: to_seconds(config.focus_minutes),
            cycles: 0,
            running: false,
            linked_type: LinkedType::Day,
            linked_id: None,
            focus_started_at: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// What the next recorded focus session is attributed to
    pub fn configure_link(&mut self, linked_type: LinkedType, linked_id: Option<String>) {
        self.linked_type = linked_type;
        self.linked_id = linked_id;
    }

    pub fn start(&mut self) {
        if !self.running {
            self.running = true;
            if self.phase == Phase::Focus && self.focus_started_at.is_none() {
                self.focus_started_at = Some(utils::now_timestamp());
            }
        }
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Stop and go back to the start of a focus phase; completed cycles are kept
    pub fn reset(&mut self) {
        self.pause();
        self.phase = Phase::Focus;
        self.remaining = to_seconds(self.config.focus_minutes);
        self.focus_started_at = None;
    }

    /// Advance one second. Returns `None` while paused.
    pub fn tick(&mut self) -> Option<Tick> {
        if !self.running {
            return None;
        }
        if self.remaining == 0 {
            return Some(self.complete_phase());
        }
        self.remaining -= 1;
        Some(Tick::Remaining(self.remaining))
    }

    fn complete_phase(&mut self) -> Tick {
        match self.phase {
            Phase::Focus => {
                self.cycles += 1;
                let next = if self.cycles % self.config.cycles_before_long_break.max(1) == 0 {
                    Phase::LongBreak
                } else {
                    Phase::ShortBreak
                };
                let break_minutes = match next {
                    Phase::LongBreak => self.config.long_break_minutes,
                    _ => self.config.short_break_minutes,
                };

                let start_time = self
                    .focus_started_at
                    .take()
                    .unwrap_or_else(utils::now_timestamp);
                let session = NewSession::new(
                    start_time,
                    i64::from(self.config.focus_minutes) * 60,
                    i64::from(break_minutes) * 60,
                    self.linked_type,
                )
                .with_link(self.linked_id.clone());

                self.phase = next;
                self.remaining = to_seconds(break_minutes);
                Tick::Completed {
                    next,
                    session: Some(session),
                }
            }
            Phase::ShortBreak | Phase::LongBreak => {
                self.phase = Phase::Focus;
                self.remaining = to_seconds(self.config.focus_minutes);
                self.focus_started_at = Some(utils::now_timestamp());
                Tick::Completed {
                    next: Phase::Focus,
                    session: None,
                }
            }
        }
    }
}

/// Format seconds as MM:SS
pub fn format_remaining(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
