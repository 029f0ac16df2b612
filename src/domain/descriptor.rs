//! Device identifier parser
//!
//! Every generator works off a [`DeviceDescriptor`] parsed once per device id,
//! instead of running its own substring tests.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::Brand;

/// `<line letters><series digits><suffix letters>`, e.g. `s24`, `fold5`, `7a`
static SERIES_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z]*)(\d{1,3})([a-z]*)$").expect("series token pattern is valid"));

/// Numbers above this are years ("iphone-se-2022"), not series
const MAX_SERIES_NUMBER: u32 = 99;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TierFlags {
    pub pro: bool,
    pub plus: bool,
    pub max: bool,
    pub ultra: bool,
    pub lite: bool,
    pub mini: bool,
    pub fold: bool,
    pub flip: bool,
}

impl TierFlags {
    #[must_use]
    pub const fn is_pro_max(&self) -> bool {
        self.pro && self.max
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub device_id: String,
    /// `None` when neither the brand slug nor a family token identifies it
    pub brand: Option<Brand>,
    /// Product line letter: Galaxy `s`/`a`/`z`, iPhone `r` (XR) / `s` (XS)
    pub line: Option<char>,
    pub series: Option<u32>,
    pub tiers: TierFlags,
}

impl DeviceDescriptor {
    /// Parses a device id slug such as `apple-iphone-15-pro-max`.
    #[must_use]
    pub fn parse(device_id: &str) -> Self {
        let normalized = device_id.trim().to_ascii_lowercase();
        let tokens: Vec<&str> = normalized.split('-').filter(|t| !t.is_empty()).collect();

        let mut descriptor = Self {
            device_id: normalized.clone(),
            brand: tokens.first().and_then(|t| Brand::from_slug(t)),
            line: None,
            series: None,
            tiers: TierFlags::default(),
        };

        for token in &tokens {
            descriptor.apply_token(token);
        }
        descriptor
    }

    fn apply_token(&mut self, token: &str) {
        match token {
            "pro" => self.tiers.pro = true,
            "plus" => self.tiers.plus = true,
            "max" | "xl" => self.tiers.max = true,
            "ultra" => self.tiers.ultra = true,
            "lite" | "se" => self.tiers.lite = true,
            "mini" => self.tiers.mini = true,
            "fold" => self.tiers.fold = true,
            "flip" => self.tiers.flip = true,
            "iphone" => self.brand = self.brand.or(Some(Brand::Apple)),
            "galaxy" => self.brand = self.brand.or(Some(Brand::Samsung)),
            "pixel" => self.brand = self.brand.or(Some(Brand::Google)),
            "redmi" | "poco" => self.brand = self.brand.or(Some(Brand::Xiaomi)),
            "nord" => self.brand = self.brand.or(Some(Brand::OnePlus)),
            // iPhone X generation
            "x" => self.set_series(10),
            "xs" | "xr" => {
                self.set_series(10);
                self.line = self.line.or(token.chars().nth(1));
            }
            _ => self.apply_series_token(token),
        }
    }

    fn apply_series_token(&mut self, token: &str) {
        let Some(caps) = SERIES_TOKEN.captures(token) else {
            return;
        };
        let prefix = caps.get(1).map_or("", |m| m.as_str());
        let suffix = caps.get(3).map_or("", |m| m.as_str());
        let Some(number) = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok()) else {
            return;
        };
        if number > MAX_SERIES_NUMBER {
            return;
        }

        match prefix {
            "fold" => self.tiers.fold = true,
            "flip" => self.tiers.flip = true,
            "" => {}
            other => {
                if other.len() == 1 {
                    self.line = self.line.or(other.chars().next());
                }
            }
        }
        if suffix == "a" {
            self.tiers.lite = true;
        }
        self.set_series(number);
    }

    fn set_series(&mut self, number: u32) {
        if self.series.is_none() {
            self.series = Some(number);
        }
    }
}
