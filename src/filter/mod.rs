//! A conjunction-of-disjunctions predicate set over [`MetaData`], used to
//! decide which decoded messages a [`crate::Parser`] hands back to its
//! caller. Every enabled predicate must pass (AND); a multi-value predicate
//! passes if any one of its values matches (OR).

use crate::meta::{GpsTime, HeaderFormat, MeasurementSource, MetaData, TimeStatus};
use std::collections::HashSet;

/// One `(id, format, source)` or `(name, format, source)` tuple a message
/// must match for the corresponding predicate to pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdFormatSource {
    pub id: u16,
    pub format: HeaderFormat,
    pub source: MeasurementSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameFormatSource {
    pub name: String,
    pub format: HeaderFormat,
    pub source: MeasurementSource,
}

/// Accumulates the predicates a [`Filter`] evaluates. Every field defaults
/// to "unset" (predicate disabled); an unset predicate never rejects a
/// message.
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    pub time_window: Option<(GpsTime, GpsTime)>,
    pub invert_time_window: bool,
    pub decimation_ms: Option<u32>,
    pub time_statuses: Option<HashSet<TimeStatus>>,
    pub id_format_source: Option<HashSet<IdFormatSource>>,
    pub name_format_source: Option<HashSet<NameFormatSource>>,
    pub include_nmea: Option<bool>,
}

impl FilterConfig {
    pub fn with_time_window(mut self, lower: GpsTime, upper: GpsTime, invert: bool) -> Self {
        self.time_window = Some((lower, upper));
        self.invert_time_window = invert;
        self
    }

    pub fn with_decimation(mut self, period_ms: u32) -> Self {
        self.decimation_ms = Some(period_ms);
        self
    }

    pub fn with_time_statuses(mut self, statuses: impl IntoIterator<Item = TimeStatus>) -> Self {
        self.time_statuses = Some(statuses.into_iter().collect());
        self
    }

    pub fn with_id_format_source(mut self, tuples: impl IntoIterator<Item = IdFormatSource>) -> Self {
        self.id_format_source = Some(tuples.into_iter().collect());
        self
    }

    pub fn with_name_format_source(mut self, tuples: impl IntoIterator<Item = NameFormatSource>) -> Self {
        self.name_format_source = Some(tuples.into_iter().collect());
        self
    }

    pub fn with_nmea(mut self, include: bool) -> Self {
        self.include_nmea = Some(include);
        self
    }
}

/// Compares two `(week, milliseconds)` GNSS times lexicographically by week
/// then by millisecond-of-week, matching how the receiver itself orders
/// time-of-week values across week rollovers.
fn time_cmp(a: &GpsTime, b: &GpsTime) -> std::cmp::Ordering {
    (a.week, a.milliseconds).cmp(&(b.week, b.milliseconds))
}

#[derive(Debug, Default)]
pub struct Filter {
    config: FilterConfig,
}

impl Filter {
    pub fn new(config: FilterConfig) -> Self {
        Filter { config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Returns whether `meta` satisfies every enabled predicate.
    pub fn do_filtering(&self, meta: &MetaData) -> bool {
        self.passes_time_window(meta)
            && self.passes_decimation(meta)
            && self.passes_time_status(meta)
            && self.passes_id_tuple(meta)
            && self.passes_name_tuple(meta)
            && self.passes_nmea(meta)
    }

    fn passes_time_window(&self, meta: &MetaData) -> bool {
        match &self.config.time_window {
            None => true,
            Some((lower, upper)) => {
                let inside = time_cmp(&meta.time, lower) != std::cmp::Ordering::Less
                    && time_cmp(&meta.time, upper) != std::cmp::Ordering::Greater;
                inside != self.config.invert_time_window
            }
        }
    }

    fn passes_decimation(&self, meta: &MetaData) -> bool {
        match self.config.decimation_ms {
            None => true,
            Some(0) => true,
            Some(period) => meta.time.milliseconds % period == 0,
        }
    }

    fn passes_time_status(&self, meta: &MetaData) -> bool {
        match &self.config.time_statuses {
            None => true,
            Some(set) => set.contains(&meta.time_status),
        }
    }

    fn passes_id_tuple(&self, meta: &MetaData) -> bool {
        match &self.config.id_format_source {
            None => true,
            Some(set) => set.contains(&IdFormatSource {
                id: meta.message_id,
                format: meta.format,
                source: meta.source,
            }),
        }
    }

    fn passes_name_tuple(&self, meta: &MetaData) -> bool {
        match &self.config.name_format_source {
            None => true,
            Some(set) => set.contains(&NameFormatSource {
                name: meta.message_name.clone(),
                format: meta.format,
                source: meta.source,
            }),
        }
    }

    fn passes_nmea(&self, meta: &MetaData) -> bool {
        match self.config.include_nmea {
            None => true,
            Some(include) => include || meta.format != HeaderFormat::Nmea,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn meta(week: u16, ms: u32, status: TimeStatus) -> MetaData {
        MetaData {
            time: GpsTime::new(week, ms),
            time_status: status,
            ..Default::default()
        }
    }

    #[test]
    fn unset_predicates_always_pass() {
        let filter = Filter::new(FilterConfig::default());
        assert!(filter.do_filtering(&meta(2200, 0, TimeStatus::Unknown)));
    }

    #[test]
    fn time_window_includes_bounds() {
        let config = FilterConfig::default().with_time_window(
            GpsTime::new(2200, 0),
            GpsTime::new(2200, 86_400_000),
            false,
        );
        let filter = Filter::new(config);
        assert!(filter.do_filtering(&meta(2200, 0, TimeStatus::Unknown)));
        assert!(filter.do_filtering(&meta(2200, 86_400_000, TimeStatus::Unknown)));
        assert!(!filter.do_filtering(&meta(2201, 0, TimeStatus::Unknown)));
    }

    #[test]
    fn inverted_time_window_excludes_inside() {
        let config = FilterConfig::default().with_time_window(
            GpsTime::new(2200, 0),
            GpsTime::new(2200, 1000),
            true,
        );
        let filter = Filter::new(config);
        assert!(!filter.do_filtering(&meta(2200, 500, TimeStatus::Unknown)));
        assert!(filter.do_filtering(&meta(2201, 0, TimeStatus::Unknown)));
    }

    #[test]
    fn decimation_keeps_only_multiples_of_period() {
        let config = FilterConfig::default().with_decimation(1000);
        let filter = Filter::new(config);
        assert!(filter.do_filtering(&meta(2200, 5000, TimeStatus::Unknown)));
        assert!(!filter.do_filtering(&meta(2200, 5500, TimeStatus::Unknown)));
    }

    #[test]
    fn time_status_membership_is_or() {
        let config =
            FilterConfig::default().with_time_statuses([TimeStatus::Fine, TimeStatus::FineSteering]);
        let filter = Filter::new(config);
        assert!(filter.do_filtering(&meta(2200, 0, TimeStatus::Fine)));
        assert!(filter.do_filtering(&meta(2200, 0, TimeStatus::FineSteering)));
        assert!(!filter.do_filtering(&meta(2200, 0, TimeStatus::Unknown)));
    }

    #[test]
    fn predicates_combine_with_and() {
        let config = FilterConfig::default()
            .with_time_statuses([TimeStatus::FineSteering])
            .with_time_window(GpsTime::new(2200, 0), GpsTime::new(2200, 86_400_000), false);
        let filter = Filter::new(config);
        // right status, wrong week -> fails the AND
        assert!(!filter.do_filtering(&meta(2201, 0, TimeStatus::FineSteering)));
        // right week, wrong status -> fails the AND
        assert!(!filter.do_filtering(&meta(2200, 0, TimeStatus::Unknown)));
        // both -> passes
        assert!(filter.do_filtering(&meta(2200, 0, TimeStatus::FineSteering)));
    }

    #[test]
    fn nmea_exclusion() {
        let config = FilterConfig::default().with_nmea(false);
        let filter = Filter::new(config);
        let mut m = meta(2200, 0, TimeStatus::Unknown);
        m.format = HeaderFormat::Nmea;
        assert!(!filter.do_filtering(&m));
        m.format = HeaderFormat::Binary;
        assert!(filter.do_filtering(&m));
    }
}
