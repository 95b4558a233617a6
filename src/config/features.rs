//! Feature flags for optional functionality.

/// The statistics trackers that can be written to the web application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tracker {
    /// Whether the player is currently online.
    OnlineStatus,
    /// Time of the last login or logout.
    LastOnline,
    /// Accumulated play time.
    GameTime,
    /// Experience level.
    Level,
    /// Total experience.
    TotalXp,
    /// Experience towards the next level.
    CurrentXp,
    /// Current health.
    Health,
    /// Ticks since the last death.
    Lifeticks,
    /// In-game wallet balance.
    Wallet,
}

impl Tracker {
    /// Every tracker, in validation order.
    pub const ALL: [Self; 9] = [
        Self::OnlineStatus,
        Self::LastOnline,
        Self::GameTime,
        Self::Level,
        Self::TotalXp,
        Self::CurrentXp,
        Self::Health,
        Self::Lifeticks,
        Self::Wallet,
    ];

    /// Returns the tracker's section name under `statistics.trackers`.
    #[must_use]
    pub const fn config_key(self) -> &'static str {
        match self {
            Self::OnlineStatus => "online-status",
            Self::LastOnline => "last-online",
            Self::GameTime => "game-time",
            Self::Level => "level",
            Self::TotalXp => "total-xp",
            Self::CurrentXp => "current-xp",
            Self::Health => "health",
            Self::Lifeticks => "lifeticks",
            Self::Wallet => "wallet",
        }
    }

    /// Returns `true` for trackers that may also write a human-readable
    /// companion value.
    #[must_use]
    pub const fn has_formatted(self) -> bool {
        matches!(
            self,
            Self::LastOnline | Self::GameTime | Self::CurrentXp | Self::Lifeticks
        )
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.config_key())
    }
}

/// Per-tracker enablement, plus whether each formatted companion is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackerFlags {
    enabled: [bool; 9],
    formatted: [bool; 9],
}

impl TrackerFlags {
    /// Returns whether a tracker is enabled.
    #[must_use]
    pub const fn is_enabled(&self, tracker: Tracker) -> bool {
        self.enabled[tracker.index()]
    }

    /// Returns whether a tracker's formatted companion is in use.
    #[must_use]
    pub const fn has_formatted(&self, tracker: Tracker) -> bool {
        self.formatted[tracker.index()]
    }

    /// Returns `true` if at least one tracker is enabled.
    #[must_use]
    pub fn any_enabled(&self) -> bool {
        self.enabled.iter().any(|enabled| *enabled)
    }

    /// Returns the enabled trackers in validation order.
    pub fn enabled(&self) -> impl Iterator<Item = Tracker> + '_ {
        Tracker::ALL.into_iter().filter(|t| self.is_enabled(*t))
    }

    /// Sets a tracker's flags.
    ///
    /// The formatted companion is only recorded for trackers that have one.
    #[must_use]
    pub const fn with(mut self, tracker: Tracker, enabled: bool, formatted: bool) -> Self {
        self.enabled[tracker.index()] = enabled;
        self.formatted[tracker.index()] = formatted && tracker.has_formatted();
        self
    }

    /// Disables a tracker and its formatted companion.
    #[must_use]
    pub const fn without(mut self, tracker: Tracker) -> Self {
        self.enabled[tracker.index()] = false;
        self.formatted[tracker.index()] = false;
        self
    }

    /// Stops writing a tracker's formatted companion.
    #[must_use]
    pub const fn without_formatted(mut self, tracker: Tracker) -> Self {
        self.formatted[tracker.index()] = false;
        self
    }

    fn intersect(self, other: Self) -> Self {
        let mut out = self;
        for i in 0..out.enabled.len() {
            out.enabled[i] &= other.enabled[i];
            out.formatted[i] &= other.formatted[i] && out.enabled[i];
        }
        out
    }
}

/// Feature flags for controlling optional bridge features.
///
/// After loading, flags only ever move toward `false`: see
/// [`FeatureFlags::intersect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    /// Avatar lookup in the web application.
    pub avatar: bool,
    /// Players must have an avatar set.
    pub require_avatar: bool,
    /// Post count lookup in the web application.
    pub post_count: bool,
    /// Players must have a minimum number of posts.
    pub require_minimum_posts: bool,
    /// Statistics tracking.
    pub statistics: bool,
    /// Individual statistics trackers.
    pub trackers: TrackerFlags,
    /// Web application primary group lookup.
    pub webapp_primary_group: bool,
    /// Web application secondary group lookup.
    pub webapp_secondary_group: bool,
    /// Two-way group synchronization.
    pub simple_synchronization: bool,
    /// Ban synchronization.
    pub ban_synchronization: bool,
    /// An economy engine is available and wanted.
    pub economy: bool,
    /// A group is assigned to unregistered players.
    pub linking_unregistered_group: bool,
    /// A group is assigned to registered players.
    pub linking_registered_group: bool,
}

impl FeatureFlags {
    /// Creates feature flags with all features disabled.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Simple synchronization with at least one web group source.
    #[must_use]
    pub const fn group_synchronization_active(&self) -> bool {
        self.simple_synchronization && (self.webapp_primary_group || self.webapp_secondary_group)
    }

    /// Per-player cache files are needed.
    #[must_use]
    pub const fn player_data_required(&self) -> bool {
        self.group_synchronization_active()
    }

    /// A permissions system must be present.
    #[must_use]
    pub const fn permissions_system_required(&self) -> bool {
        self.group_synchronization_active()
            || self.linking_unregistered_group
            || self.linking_registered_group
    }

    /// Returns `true` if wallet balances should be read.
    #[must_use]
    pub const fn wallet_tracking(&self) -> bool {
        self.economy && self.trackers.is_enabled(Tracker::Wallet)
    }

    /// Keeps only the features enabled in both `self` and `other`.
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        Self {
            avatar: self.avatar && other.avatar,
            require_avatar: self.require_avatar && other.require_avatar,
            post_count: self.post_count && other.post_count,
            require_minimum_posts: self.require_minimum_posts && other.require_minimum_posts,
            statistics: self.statistics && other.statistics,
            trackers: self.trackers.intersect(other.trackers),
            webapp_primary_group: self.webapp_primary_group && other.webapp_primary_group,
            webapp_secondary_group: self.webapp_secondary_group && other.webapp_secondary_group,
            simple_synchronization: self.simple_synchronization && other.simple_synchronization,
            ban_synchronization: self.ban_synchronization && other.ban_synchronization,
            economy: self.economy && other.economy,
            linking_unregistered_group: self.linking_unregistered_group
                && other.linking_unregistered_group,
            linking_registered_group: self.linking_registered_group
                && other.linking_registered_group,
        }
    }

    /// Disables every flag whose prerequisite is disabled.
    ///
    /// Requirements follow their data source and game time follows last
    /// online. Statistics needs at least one tracker, and trackers need
    /// statistics.
    #[must_use]
    pub fn settle(mut self) -> Self {
        self.require_avatar &= self.avatar;
        self.require_minimum_posts &= self.post_count;
        if !self.trackers.is_enabled(Tracker::LastOnline) {
            self.trackers = self.trackers.without(Tracker::GameTime);
        }
        self.statistics &= self.trackers.any_enabled();
        if !self.statistics {
            self.trackers = TrackerFlags::default();
        }
        self
    }
}
