//! Built-in device catalog
//!
//! Base values are EUR resale prices for a 128GB (or entry storage) unit in
//! new condition.

use crate::domain::catalog::{Brand, BrandTables, DeviceCategory, StaticCatalog};

const S_128_1T: &[&str] = &["128GB", "256GB", "512GB", "1TB"];
const S_128_512: &[&str] = &["128GB", "256GB", "512GB"];
const S_256_1T: &[&str] = &["256GB", "512GB", "1TB"];
const S_64_256: &[&str] = &["64GB", "128GB", "256GB"];
const S_64_512: &[&str] = &["64GB", "256GB", "512GB"];
const S_128_256: &[&str] = &["128GB", "256GB"];

fn apple() -> BrandTables {
    BrandTables::new(DeviceCategory::Smartphone)
        .with_model("iPhone XR", 140, S_64_256)
        .with_model("iPhone XS", 150, S_64_512)
        .with_model("iPhone XS Max", 180, S_64_512)
        .with_model("iPhone 11", 200, S_64_256)
        .with_model("iPhone 11 Pro", 250, S_64_512)
        .with_model("iPhone 11 Pro Max", 290, S_64_512)
        .with_model("iPhone 12 mini", 230, S_64_256)
        .with_model("iPhone 12", 290, S_64_256)
        .with_model("iPhone 12 Pro", 360, &["128GB", "256GB", "512GB"])
        .with_model("iPhone 12 Pro Max", 420, S_128_512)
        .with_model("iPhone 13 mini", 330, S_128_512)
        .with_model("iPhone 13", 390, S_128_512)
        .with_model("iPhone 13 Pro", 480, S_128_1T)
        .with_model("iPhone 13 Pro Max", 540, S_128_1T)
        .with_model("iPhone 14", 470, S_128_512)
        .with_model("iPhone 14 Plus", 520, S_128_512)
        .with_model("iPhone 14 Pro", 620, S_128_1T)
        .with_model("iPhone 14 Pro Max", 690, S_128_1T)
        .with_model("iPhone 15", 600, S_128_512)
        .with_model("iPhone 15 Plus", 660, S_128_512)
        .with_model("iPhone 15 Pro", 780, S_128_1T)
        .with_model("iPhone 15 Pro Max", 880, S_256_1T)
        .with_model("iPhone 16", 720, S_128_512)
        .with_model("iPhone 16 Plus", 800, S_128_512)
        .with_model("iPhone 16 Pro", 920, S_128_1T)
        .with_model("iPhone 16 Pro Max", 1040, S_256_1T)
        .with_model("iPhone SE 2022", 210, S_64_256)
}

fn samsung() -> BrandTables {
    BrandTables::new(DeviceCategory::Smartphone)
        .with_model("Galaxy S21", 220, S_128_256)
        .with_model("Galaxy S23", 420, S_128_512)
        .with_model("Galaxy S24", 540, S_128_512)
        .with_model("Galaxy S24+", 640, &["256GB", "512GB"])
        .with_model("Galaxy S24 Ultra", 860, S_256_1T)
        .with_model("Galaxy Z Fold5", 900, S_256_1T)
        .with_model("Galaxy Z Flip5", 520, &["256GB", "512GB"])
        .with_model("Galaxy A54", 210, S_128_256)
        .with_model("Galaxy A34", 160, S_128_256)
}

fn google() -> BrandTables {
    BrandTables::new(DeviceCategory::Smartphone)
        .with_model("Pixel 6", 180, S_128_256)
        .with_model("Pixel 6 Pro", 240, S_128_512)
        .with_model("Pixel 6a", 140, &["128GB"])
        .with_model("Pixel 7", 260, S_128_256)
        .with_model("Pixel 7 Pro", 350, S_128_512)
        .with_model("Pixel 7a", 220, &["128GB"])
        .with_model("Pixel 8", 380, S_128_256)
        .with_model("Pixel 8 Pro", 520, &["128GB", "256GB", "512GB", "1TB"])
        .with_model("Pixel 8a", 320, S_128_256)
        .with_model("Pixel 9", 540, S_128_256)
        .with_model("Pixel 9 Pro", 720, S_128_1T)
        .with_model("Pixel 9 Pro XL", 800, S_128_1T)
}

fn xiaomi() -> BrandTables {
    BrandTables::new(DeviceCategory::Smartphone)
        .with_model("13", 300, S_128_256)
        .with_model("13 Pro", 380, S_128_256)
        .with_model("14", 480, S_256_1T)
        .with_model("14 Ultra", 760, &["512GB"])
        .with_model("Redmi Note 13 Pro", 190, S_128_512)
}

fn oneplus() -> BrandTables {
    BrandTables::new(DeviceCategory::Smartphone)
        .with_model("11", 310, S_128_256)
        .with_model("12", 470, &["256GB", "512GB"])
        .with_model("Nord 3", 200, S_128_256)
}

/// Catalog shipped with the binary
#[must_use]
pub fn builtin_catalog() -> StaticCatalog {
    StaticCatalog::new()
        .with_brand(Brand::Apple, apple())
        .with_brand(Brand::Samsung, samsung())
        .with_brand(Brand::Google, google())
        .with_brand(Brand::Xiaomi, xiaomi())
        .with_brand(Brand::OnePlus, oneplus())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::CatalogProvider;

    #[test]
    fn every_builtin_entry_validates() {
        let catalog = builtin_catalog();
        for brand in catalog.brands() {
            for entry in catalog.entries(brand) {
                assert!(entry.validate().is_ok(), "{}", entry.device_id());
                assert!(!entry.storage.is_empty(), "{}", entry.device_id());
            }
        }
    }

    #[test]
    fn device_ids_resolve_back_to_their_own_entry() {
        let catalog = builtin_catalog();
        for brand in catalog.brands() {
            for entry in catalog.entries(brand) {
                let id = entry.device_id();
                assert_eq!(catalog.resolve_storage(brand, &id).unwrap(), entry.storage, "{id}");
                assert_eq!(catalog.resolve_base_value(brand, &id), entry.base_value, "{id}");
            }
        }
    }
}
