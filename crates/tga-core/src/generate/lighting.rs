//! Artificial lighting by the lumen method, plus daylight ratio.

use crate::domain::{ArtifactDocument, CalculationTable, Discipline, GenerationError, SpaceType};
use crate::generate::tables::fmt;
use crate::generate::{room_row, DisciplineGenerator, GenerationInput, MetricsExt, GENERATOR_VERSION};

const LUMINAIRE_LUMENS: f64 = 4000.0;
const LUMINAIRE_WATTS: f64 = 35.0;
const UTILISATION_FACTOR: f64 = 0.6;
const MAINTENANCE_FACTOR: f64 = 0.8;

/// Maintained illuminance target in lux.
fn target_lux(space: SpaceType) -> f64 {
    match space {
        SpaceType::Office | SpaceType::Meeting => 500.0,
        SpaceType::Classroom | SpaceType::Kitchen | SpaceType::Retail | SpaceType::Production => 300.0,
        SpaceType::Sanitary | SpaceType::Bathroom | SpaceType::Technical => 200.0,
        SpaceType::Living | SpaceType::Other => 200.0,
        SpaceType::Stair => 150.0,
        SpaceType::Corridor | SpaceType::Storage | SpaceType::Ward | SpaceType::Bedroom => 100.0,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LightingGenerator;

impl DisciplineGenerator for LightingGenerator {
    fn discipline(&self) -> Discipline {
        Discipline::Lighting
    }

    fn design(&self, input: &GenerationInput) -> Result<ArtifactDocument, GenerationError> {
        let mut doc = ArtifactDocument::new(self.discipline(), GENERATOR_VERSION);
        let mut table = CalculationTable::new(
            "Luminaire schedule",
            &["Room", "Use", "Target lx", "Luminaires", "Achieved lx", "W/m²", "Window/floor"],
        );
        let lumens_effective = LUMINAIRE_LUMENS * UTILISATION_FACTOR * MAINTENANCE_FACTOR;

        let mut luminaires_total = 0u32;
        let mut watts_total = 0.0;
        let mut area_total = 0.0;

        for room in &input.building.rooms {
            if room.area_m2 <= 0.0 {
                return Err(GenerationError::new(
                    self.discipline(),
                    format!("room {} has no floor area", room.id),
                ));
            }
            let target = target_lux(room.space_type);
            let luminaires = ((target * room.area_m2 / lumens_effective).ceil() as u32).max(1);
            let achieved = luminaires as f64 * lumens_effective / room.area_m2;
            let watts = luminaires as f64 * LUMINAIRE_WATTS;
            let lpd = watts / room.area_m2;

            let mut row = room_row(room);
            row.put("target_lux", target);
            row.put("luminaires", luminaires as f64);
            row.put("achieved_lux", achieved);
            row.put("illuminance_ratio", achieved / target);
            row.put("lpd_w_m2", lpd);
            let mut daylight = "-".to_string();
            if room.space_type.is_occupied() {
                let ratio = room.window_area_m2 / room.area_m2;
                row.put("window_to_floor_ratio", ratio);
                daylight = fmt(ratio, 3);
            }
            doc.rooms.push(row);

            luminaires_total += luminaires;
            watts_total += watts;
            area_total += room.area_m2;

            table.push_row(vec![
                room.id.clone(),
                room.space_type.to_string(),
                fmt(target, 0),
                luminaires.to_string(),
                fmt(achieved, 0),
                fmt(lpd, 1),
                daylight,
            ]);
        }

        doc.put("total_luminaires", luminaires_total as f64);
        doc.put("lighting_power_kw", watts_total / 1000.0);
        doc.put("mean_lpd_w_m2", watts_total / area_total);
        doc.tables.push(table);
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::test_support::{room, sample_input};

    #[test]
    fn test_office_lumen_method() {
        let doc = LightingGenerator
            .design(&sample_input(Discipline::Lighting))
            .expect("design");
        // 500 lx × 30 m² / (4000 × 0.6 × 0.8) = 7.8 → 8 luminaires
        let office = room(&doc, "L0-R02");
        assert_eq!(office.metrics.get("luminaires"), Some(&8.0));
        assert!(office.metrics["illuminance_ratio"] >= 1.0);
        assert_eq!(office.metrics.get("window_to_floor_ratio"), Some(&0.12));
    }

    #[test]
    fn test_north_offices_lack_daylight() {
        let doc = LightingGenerator
            .design(&sample_input(Discipline::Lighting))
            .expect("design");
        // two 1.2 m × 1.5 m windows on 40 m²
        let north = room(&doc, "L0-R08");
        assert_eq!(north.metrics.get("window_to_floor_ratio"), Some(&0.09));
        let corridor = room(&doc, "L0-R07");
        assert!(!corridor.metrics.contains_key("window_to_floor_ratio"));
        assert!(doc.metric("mean_lpd_w_m2").expect("lpd") < 12.0);
    }
}
