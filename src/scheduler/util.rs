use crate::model::BlackoutWindow;
use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};

/// Semaine de travail ancrée sur sa date de départ (normalement un lundi)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekCalendar {
    start: NaiveDate,
}

impl WeekCalendar {
    pub const WORKING_DAYS: usize = 5;

    pub fn new(start: NaiveDate) -> Self {
        Self { start }
    }

    /// Lundi suivant `today`, strictement après (un lundi renvoie le suivant).
    pub fn next_monday(today: NaiveDate) -> Self {
        let ahead = 7 - i64::from(today.weekday().num_days_from_monday());
        Self::new(today + Duration::days(ahead))
    }

    pub fn upcoming() -> Self {
        Self::next_monday(Local::now().date_naive())
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Les 7 dates de la semaine, pool du tirage automatique.
    pub fn all_dates(&self) -> Vec<NaiveDate> {
        (0..7).map(|i| self.start + Duration::days(i)).collect()
    }

    /// Jours ouvrés (lundi → vendredi dans le cas nominal) et leurs dates.
    pub fn working_days(&self) -> Vec<(Weekday, NaiveDate)> {
        (0..Self::WORKING_DAYS as i64)
            .map(|i| {
                let date = self.start + Duration::days(i);
                (date.weekday(), date)
            })
            .collect()
    }
}

/// Dates du formulaire en `JJ/MM/AAAA` ; le format ISO est aussi accepté.
pub fn parse_form_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

pub fn format_form_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

pub fn in_blackout(date: NaiveDate, windows: &[BlackoutWindow], buffer_days: u32) -> bool {
    windows.iter().any(|w| w.covers(date, buffer_days))
}

pub fn adjacent(a: NaiveDate, b: NaiveDate) -> bool {
    (a - b).num_days().abs() == 1
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn next_monday_skips_today() {
        assert_eq!(WeekCalendar::next_monday(d(2025, 7, 7)).start(), d(2025, 7, 14));
        assert_eq!(WeekCalendar::next_monday(d(2025, 7, 6)).start(), d(2025, 7, 7));
        assert_eq!(WeekCalendar::next_monday(d(2025, 7, 9)).start(), d(2025, 7, 14));
    }

    #[test]
    fn parses_both_date_layouts() {
        assert_eq!(parse_form_date("07/07/2025"), Some(d(2025, 7, 7)));
        assert_eq!(parse_form_date("2025-07-07"), Some(d(2025, 7, 7)));
        assert_eq!(parse_form_date("Monday"), None);
        assert_eq!(format_form_date(d(2025, 7, 7)), "07/07/2025");
    }

    #[test]
    fn working_days_are_five() {
        let week = WeekCalendar::new(d(2025, 7, 7));
        let days = week.working_days();
        assert_eq!(days.len(), 5);
        assert_eq!(days[0], (Weekday::Mon, d(2025, 7, 7)));
        assert_eq!(days[4].0, Weekday::Fri);
        assert_eq!(week.all_dates().len(), 7);
    }
}
