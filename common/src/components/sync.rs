// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

/// A two-stage register synchronizer for a signal that crosses into
/// another clock domain. The consuming domain clocks it once per tick
/// with whatever value the signal currently has; the returned value
/// trails the input by two ticks, which models the settling delay of
/// the registered pipeline it stands in for.
#[derive(Debug, Default, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Synchronizer<T: Copy + Default> {
    stages: [T; 2],
}

impl<T: Copy + Default> Synchronizer<T> {
    /// Clock the synchronizer with the current value of the foreign
    /// signal, returning the value visible in this domain on this tick.
    pub fn tick(&mut self, input: T) -> T {
        let out = self.stages[1];
        self.stages[1] = self.stages[0];
        self.stages[0] = input;
        out
    }

    /// The value currently visible in the consuming domain, without
    /// advancing the pipeline.
    pub fn current(&self) -> T {
        self.stages[1]
    }
}
