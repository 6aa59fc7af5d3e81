// This file is part of Opgas.
//
// Opgas is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Opgas is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Opgas.
// If not, see https://www.gnu.org/licenses/.

//! Scoped timers that record their lifetime to a histogram.

use std::time::{Duration, Instant};

use metrics::Histogram;

/// Records the milliseconds between its creation and drop into a histogram.
///
/// ```ignore
/// fn estimate(&self) {
///     let _timer = CustomTimerGuard::new(self.metrics.vgl_estimate_ms.clone());
///     // ...
/// } // recorded here
/// ```
pub struct CustomTimerGuard {
    timer: Instant,
    metric: Histogram,
}

impl CustomTimerGuard {
    /// Starts a timer that records to `metric` on drop.
    pub fn new(metric: Histogram) -> Self {
        Self {
            timer: Instant::now(),
            metric,
        }
    }

    /// Time since the guard was created.
    pub fn elapsed(&self) -> Duration {
        self.timer.elapsed()
    }
}

impl Drop for CustomTimerGuard {
    fn drop(&mut self) {
        self.metric.record(self.timer.elapsed().as_millis() as f64);
    }
}
