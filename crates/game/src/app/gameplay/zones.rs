#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZoneTransition {
    EnteredStart { zone_index: usize, first_time: bool },
    ExitedStart { zone_index: usize },
    EnteredEnd,
}

#[derive(Debug, Clone)]
struct TrackedStartZone {
    def: StartZoneDef,
    entered_before: bool,
}

/// Turns per-tick player positions into zone enter/exit transitions.
///
/// When start zones overlap the lowest index wins. "First time" is tracked
/// per zone for the lifetime of the tracker.
#[derive(Debug, Clone, Default)]
struct ZoneTracker {
    start_zones: Vec<TrackedStartZone>,
    end_zones: Vec<ZoneBox>,
    inside_start: Option<usize>,
    inside_end: bool,
    last_start: Option<usize>,
}

impl ZoneTracker {
    fn from_level(level: &LevelDef) -> Self {
        Self {
            start_zones: level
                .start_zones
                .iter()
                .cloned()
                .map(|def| TrackedStartZone {
                    def,
                    entered_before: false,
                })
                .collect(),
            end_zones: level.end_zones.clone(),
            inside_start: None,
            inside_end: false,
            last_start: None,
        }
    }

    fn start_zone(&self, zone_index: usize) -> Option<&StartZoneDef> {
        self.start_zones.get(zone_index).map(|zone| &zone.def)
    }

    /// The zone the player is in, else the one most recently entered, else
    /// the first declared.
    fn active_start_zone_index(&self) -> Option<usize> {
        self.inside_start
            .or(self.last_start)
            .or_else(|| (!self.start_zones.is_empty()).then_some(0))
    }

    /// Mirrors a signal injected from the console, so the next observed
    /// position is compared against what the orchestrator was told.
    fn apply_injected_signal(&mut self, signal: ZoneSignal, zone_index: Option<usize>) {
        let zone_index = zone_index.filter(|&index| index < self.start_zones.len());
        match signal {
            ZoneSignal::EnteredStartZone => {
                if let Some(index) = zone_index {
                    self.start_zones[index].entered_before = true;
                    self.inside_start = Some(index);
                    self.last_start = Some(index);
                }
            }
            ZoneSignal::EnteredStartZoneFirstTime => {
                if let Some(index) = zone_index {
                    self.start_zones[index].entered_before = true;
                }
            }
            ZoneSignal::ExitedStartZone => self.inside_start = None,
            ZoneSignal::EnteredEndZone => self.inside_end = true,
        }
    }

    fn observe(&mut self, position: Vec3) -> Vec<ZoneTransition> {
        let mut transitions = Vec::new();

        let current_start = self
            .start_zones
            .iter()
            .position(|zone| zone.def.bounds.contains(position));
        if current_start != self.inside_start {
            if let Some(zone_index) = self.inside_start {
                transitions.push(ZoneTransition::ExitedStart { zone_index });
            }
            if let Some(zone_index) = current_start {
                let zone = &mut self.start_zones[zone_index];
                transitions.push(ZoneTransition::EnteredStart {
                    zone_index,
                    first_time: !zone.entered_before,
                });
                zone.entered_before = true;
                self.last_start = Some(zone_index);
            }
            self.inside_start = current_start;
        }

        let in_end = self.end_zones.iter().any(|zone| zone.contains(position));
        if in_end && !self.inside_end {
            transitions.push(ZoneTransition::EnteredEnd);
        }
        self.inside_end = in_end;

        transitions
    }
}
