use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use validator::{Validate, ValidationErrors};

use crate::timezone::utc_offset;
use crate::types::Place;

lazy_static! {
    static ref TIME_RE: Regex = Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").unwrap();
}

/// Dates the form accepts: ISO and the locale's day-first format.
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

pub const PLACE_REQUIRED: &str = "Escolha a cidade na lista de sugestões";

#[derive(Debug, Clone, Default, PartialEq, Validate)]
pub struct BirthForm {
    #[validate(length(min = 2, max = 100, message = "Informe seu nome completo"))]
    pub full_name: String,
    pub birth_date: String,
    #[validate(regex(path = "TIME_RE", message = "Use o formato HH:MM (24h)"))]
    pub birth_time: String,
    #[validate(email(message = "E-mail inválido"))]
    pub email: String,
}

impl BirthForm {
    pub fn new(full_name: &str, birth_date: &str, birth_time: &str, email: &str) -> Self {
        Self {
            full_name: full_name.trim().to_string(),
            birth_date: birth_date.trim().to_string(),
            birth_time: birth_time.trim().to_string(),
            email: email.trim().to_string(),
        }
    }
}

pub fn parse_birth_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value.trim(), format).ok())
}

/// Field name to message. Empty means the form can be sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors(BTreeMap<&'static str, String>);

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = FormErrors::default();
        for (field, errs) in errors.field_errors() {
            let message = errs
                .iter()
                .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| "Valor inválido".to_string());
            out.add(field, message);
        }
        out
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        write!(f, "{}", parts.join("; "))
    }
}

fn check(
    form: &BirthForm,
    place: Option<&Place>,
    today: NaiveDate,
) -> Result<NaiveDate, FormErrors> {
    let mut errors = form.validate().err().map(FormErrors::from).unwrap_or_default();

    let earliest = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN);
    let date = parse_birth_date(&form.birth_date);
    match date {
        None => errors.add("birth_date", "Data inválida (dd/mm/aaaa)"),
        Some(d) if d < earliest || d > today => {
            errors.add("birth_date", "A data deve estar entre 01/01/1900 e hoje")
        }
        Some(_) => {}
    }

    if !place.is_some_and(|p| !p.timezone.is_empty()) {
        errors.add("place", PLACE_REQUIRED);
    }

    match date {
        Some(d) if errors.is_empty() => Ok(d),
        _ => Err(errors),
    }
}

pub fn validate(form: &BirthForm, place: Option<&Place>, today: NaiveDate) -> FormErrors {
    check(form, place, today).err().unwrap_or_default()
}

pub fn can_submit(form: &BirthForm, place: Option<&Place>, today: NaiveDate) -> bool {
    check(form, place, today).is_ok()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    pub full_name: String,
    pub birth_date: NaiveDate,
    pub birth_time: String,
    pub email: String,
    pub place: PlacePayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacePayload {
    pub city: String,
    pub admin: String,
    pub country: String,
    pub country_code: String,
    pub lat: f64,
    pub lon: f64,
    pub timezone: String,
    pub timezone_offset: String,
    pub provider: String,
    pub place_id: String,
}

impl ReportPayload {
    /// Snapshot of the form at `now`. "Today" for the birth date bound is the
    /// calendar date of `now` in its own zone, so pass the same clock the
    /// prompts were checked against. The offset is taken at `now` too, since
    /// it can change between picking the place and sending.
    pub fn build<Z: TimeZone>(
        form: &BirthForm,
        place: &Place,
        now: DateTime<Z>,
    ) -> Result<Self, FormErrors> {
        let birth_date = check(form, Some(place), now.date_naive())?;
        Ok(ReportPayload {
            full_name: form.full_name.clone(),
            birth_date,
            birth_time: form.birth_time.clone(),
            email: form.email.clone(),
            place: PlacePayload {
                city: place.city.clone(),
                admin: place.admin.clone().unwrap_or_default(),
                country: place.country.clone(),
                country_code: place.country_code.clone(),
                lat: place.lat,
                lon: place.lon,
                timezone: place.timezone.clone(),
                timezone_offset: utc_offset(&place.timezone, now.with_timezone(&Utc)),
                provider: place.provider.clone(),
                place_id: place.place_id.clone(),
            },
        })
    }
}
