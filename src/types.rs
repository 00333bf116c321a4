use serde::Deserialize;

use crate::timezone::resolve_timezone;

/// Identifies the geocoding source on every resolved place.
pub const PROVIDER: &str = "geoapify";

#[derive(Default, Debug, Clone, PartialEq, Deserialize)]
/// This is based on the Geoapify autocomplete GeoJSON response
pub struct GeoapifyResponse {
    #[serde(default)]
    pub features: Vec<GeoapifyFeature>,
}

#[derive(Default, Debug, Clone, PartialEq, Deserialize)]
pub struct GeoapifyFeature {
    pub properties: GeoapifyProperties,
}

#[derive(Default, Debug, Clone, PartialEq, Deserialize)]
pub struct GeoapifyProperties {
    pub formatted: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub place_id: Option<String>,
    pub timezone: Option<GeoapifyTimezone>,
}

#[derive(Default, Debug, Clone, PartialEq, Deserialize)]
pub struct GeoapifyTimezone {
    pub name: Option<String>,
}

/// A candidate place returned by the provider. Only lives until the next
/// successful search replaces the list.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub formatted: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub place_id: String,
    pub timezone: Option<String>,
}

impl Suggestion {
    /// Converts a provider feature, skipping features without coordinates.
    pub fn from_properties(props: GeoapifyProperties) -> Option<Self> {
        let (lat, lon) = (props.lat?, props.lon?);
        Some(Suggestion {
            formatted: props.formatted.unwrap_or_default(),
            city: props.city,
            state: props.state,
            country: props.country,
            country_code: props.country_code,
            lat,
            lon,
            place_id: props.place_id.unwrap_or_default(),
            timezone: props.timezone.and_then(|tz| tz.name),
        })
    }

    /// `"City, Admin, Country"`, leaving out whatever part is missing.
    pub fn label(&self) -> String {
        if non_blank(&self.city).is_none() {
            return self.formatted.clone();
        }
        [&self.city, &self.state, &self.country]
            .into_iter()
            .filter_map(non_blank)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn to_place(&self) -> Place {
        Place {
            city: non_blank(&self.city)
                .map(str::to_owned)
                .unwrap_or_else(|| self.formatted.clone()),
            admin: non_blank(&self.state).map(str::to_owned),
            country: self.country.clone().unwrap_or_default(),
            country_code: self
                .country_code
                .as_deref()
                .map(str::to_uppercase)
                .unwrap_or_default(),
            lat: self.lat,
            lon: self.lon,
            timezone: resolve_timezone(self.timezone.as_deref(), self.lat, self.lon),
            provider: PROVIDER.to_string(),
            place_id: self.place_id.clone(),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// A place the user confirmed from the suggestion list.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub city: String,
    pub admin: Option<String>,
    pub country: String,
    pub country_code: String,
    pub lat: f64,
    pub lon: f64,
    pub timezone: String,
    pub provider: String,
    pub place_id: String,
}
