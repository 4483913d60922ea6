use std::fmt;
use std::str::FromStr;

use chrono::Weekday;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Teaching days shown in the timetable grid. Sunday has no column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Day {
    pub const ALL: [Day; 6] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
    ];

    pub fn from_weekday(weekday: Weekday) -> Option<Day> {
        match weekday {
            Weekday::Mon => Some(Day::Monday),
            Weekday::Tue => Some(Day::Tuesday),
            Weekday::Wed => Some(Day::Wednesday),
            Weekday::Thu => Some(Day::Thursday),
            Weekday::Fri => Some(Day::Friday),
            Weekday::Sat => Some(Day::Saturday),
            Weekday::Sun => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
        }
    }
}

impl FromStr for Day {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Day::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown day: {}", s))
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const TIME_LABELS: [&str; 9] = [
    "09:00 AM - 10:00 AM",
    "10:00 AM - 11:00 AM",
    "11:00 AM - 12:00 PM",
    "12:00 PM - 01:00 PM",
    "01:00 PM - 02:00 PM",
    "02:00 PM - 03:00 PM",
    "03:00 PM - 04:00 PM",
    "04:00 PM - 05:00 PM",
    "05:00 PM - 06:00 PM",
];

/// One of the nine fixed one-hour labels.
///
/// Labels are compared as opaque identifiers: two labels conflict only when they are
/// the same label, the ranges they describe are never parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeLabel(usize);

impl TimeLabel {
    pub fn all() -> impl Iterator<Item = TimeLabel> {
        (0..TIME_LABELS.len()).map(TimeLabel)
    }

    pub fn as_str(&self) -> &'static str {
        TIME_LABELS[self.0]
    }
}

impl FromStr for TimeLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TIME_LABELS
            .iter()
            .position(|label| *label == s.trim())
            .map(TimeLabel)
            .ok_or_else(|| format!("unknown time slot: {}", s))
    }
}

impl fmt::Display for TimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TimeLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TimeLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotType {
    Theory,
    Lab,
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotType::Theory => f.write_str("theory"),
            SlotType::Lab => f.write_str("lab"),
        }
    }
}

/// Class type sent with a QR generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassType {
    Theory,
    Lab,
}

impl From<SlotType> for ClassType {
    fn from(value: SlotType) -> Self {
        match value {
            SlotType::Theory => ClassType::Theory,
            SlotType::Lab => ClassType::Lab,
        }
    }
}

impl fmt::Display for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassType::Theory => f.write_str("Theory"),
            ClassType::Lab => f.write_str("Lab"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub day: Day,
    pub time: TimeLabel,
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    #[serde(default)]
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

impl TimeSlot {
    pub fn occupies(&self, day: Day, time: TimeLabel) -> bool {
        self.day == day && self.time == time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_label_parse() {
        let label: TimeLabel = "10:00 AM - 11:00 AM".parse().unwrap();
        assert_eq!(label.as_str(), "10:00 AM - 11:00 AM");
        assert!("10:30 AM - 11:30 AM".parse::<TimeLabel>().is_err());
        assert_eq!(TimeLabel::all().count(), 9);
    }

    #[test]
    fn test_day_from_weekday() {
        assert_eq!(Day::from_weekday(Weekday::Tue), Some(Day::Tuesday));
        assert_eq!(Day::from_weekday(Weekday::Sun), None);
        assert_eq!("friday".parse::<Day>().unwrap(), Day::Friday);
    }

    #[test]
    fn test_slot_serializes_with_labels() {
        let slot = TimeSlot {
            day: Day::Monday,
            time: "09:00 AM - 10:00 AM".parse().unwrap(),
            slot_type: SlotType::Lab,
            branch: "CSE".to_string(),
            room: None,
        };
        let json = serde_json::to_value(&slot).unwrap();
        assert_eq!(json["day"], "Monday");
        assert_eq!(json["time"], "09:00 AM - 10:00 AM");
        assert_eq!(json["type"], "lab");
        assert!(json.get("room").is_none());
    }
}
