//! Segment queue feeding the rate tick
//!
//! A stand-in for a full motion planner: tasks push precomputed step
//! segments and the rate tick pops one per interrupt.

use heapless::Deque;

use steppulse_core::{AxisSignals, ControlSignals, MotionEvents, StepSegment};

use crate::channels::{CONTROL_CHANGED, LIMIT_TRIGGERED, MOTION_DONE};

/// Queue depth in segments
pub const QUEUE_DEPTH: usize = 64;

/// Step segments waiting for the rate timer
pub struct SegmentQueue {
    segments: Deque<StepSegment, QUEUE_DEPTH>,
    /// Drop every tick until cleared (feed hold, alarm)
    held: bool,
}

impl SegmentQueue {
    pub const fn new() -> Self {
        Self {
            segments: Deque::new(),
            held: false,
        }
    }

    /// Append a segment, handing it back if the queue is full
    pub fn push(&mut self, segment: StepSegment) -> Result<(), StepSegment> {
        self.segments.push_back(segment)
    }

    /// Free slots
    pub fn space(&self) -> usize {
        QUEUE_DEPTH - self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Drop all queued motion
    pub fn clear(&mut self) {
        self.segments.clear();
    }

    pub fn set_held(&mut self, held: bool) {
        self.held = held;
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}

impl MotionEvents for SegmentQueue {
    fn on_stepper_tick(&mut self) -> Option<StepSegment> {
        if self.held {
            return None;
        }

        let segment = self.segments.pop_front();
        if segment.is_none() {
            MOTION_DONE.signal(());
        }
        segment
    }

    fn on_limit_triggered(&mut self, limits: AxisSignals) {
        self.held = true;
        self.segments.clear();
        LIMIT_TRIGGERED.signal(limits);
    }

    fn on_control_triggered(&mut self, control: ControlSignals) {
        if control.intersects(ControlSignals::RESET | ControlSignals::FEED_HOLD) {
            self.held = true;
        }
        CONTROL_CHANGED.signal(control);
    }

    fn is_blocking_allowed(&mut self) -> bool {
        !self.held
    }
}
