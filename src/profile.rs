/// Threshold profiles: named sets of signal-level cutoffs.
///
/// Exactly one profile is active at a time. Switching replaces all four
/// cutoffs at once; channels that are already locked keep their lock.

/// Signal-level cutoffs in raw RSSI units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Minimum best level for a scan to lock
    pub min_lock: u16,
    /// Caution output and alert pulses at or above this
    pub alert: u16,
    /// Danger output and fast buzzer pattern at or above this
    pub danger: u16,
    /// Level regarded as clear again (reported only)
    pub clear: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThresholdProfile {
    Sensitive,
    #[default]
    Balanced,
    Strict,
}

impl ThresholdProfile {
    /// All profiles, in the order advertised in capabilities
    pub const ALL: [ThresholdProfile; 3] = [
        ThresholdProfile::Sensitive,
        ThresholdProfile::Balanced,
        ThresholdProfile::Strict,
    ];

    /// Resolve a profile name. Unknown names fall back to Balanced.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Sensitive" => ThresholdProfile::Sensitive,
            "Strict" => ThresholdProfile::Strict,
            _ => ThresholdProfile::Balanced,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdProfile::Sensitive => "Sensitive",
            ThresholdProfile::Balanced => "Balanced",
            ThresholdProfile::Strict => "Strict",
        }
    }

    pub const fn thresholds(&self) -> Thresholds {
        match self {
            ThresholdProfile::Sensitive => Thresholds {
                min_lock: 700,
                alert: 1100,
                danger: 1600,
                clear: 900,
            },
            ThresholdProfile::Balanced => Thresholds {
                min_lock: 900,
                alert: 1400,
                danger: 1900,
                clear: 1200,
            },
            ThresholdProfile::Strict => Thresholds {
                min_lock: 1100,
                alert: 1500,
                danger: 2100,
                clear: 1300,
            },
        }
    }
}

/// The active profile together with its cutoffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveProfile {
    profile: ThresholdProfile,
    thresholds: Thresholds,
}

impl ActiveProfile {
    pub const fn new() -> Self {
        Self {
            profile: ThresholdProfile::Balanced,
            thresholds: ThresholdProfile::Balanced.thresholds(),
        }
    }

    /// Switch profile by name; returns the profile actually applied.
    pub fn apply(&mut self, name: &str) -> ThresholdProfile {
        let profile = ThresholdProfile::from_name(name);
        *self = Self {
            profile,
            thresholds: profile.thresholds(),
        };
        log::info!("Threshold profile: {}", profile.as_str());
        profile
    }

    pub fn profile(&self) -> ThresholdProfile {
        self.profile
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }
}

impl Default for ActiveProfile {
    fn default() -> Self {
        Self::new()
    }
}
