//! Ventilation rates, design heat load and branch duct sizing.
//!
//! Outdoor air follows the person plus floor-area method for a low-polluting
//! building. Kitchens and sanitary rooms get extract rates on top. The heat
//! load combines transmission through exterior walls, windows, the roof of
//! the top storey and the ground slab of the lowest storey with the
//! ventilation loss after heat recovery.

use crate::domain::{
    ArtifactDocument, CalculationTable, Discipline, FixtureKind, GenerationError, Region, Room,
    SpaceType,
};
use crate::generate::tables::{fmt, size_round_section};
use crate::generate::{room_row, DisciplineGenerator, GenerationInput, MetricsExt, GENERATOR_VERSION};

const OUTDOOR_AIR_PER_PERSON_L_S: f64 = 7.0;
const OUTDOOR_AIR_PER_M2_L_S: f64 = 0.7;
const KITCHEN_AIR_CHANGES_H: f64 = 10.0;
const EXTRACT_PER_WC_M3_H: f64 = 50.0;
const EXTRACT_PER_SHOWER_M3_H: f64 = 50.0;
const MIN_SANITARY_EXTRACT_M3_H: f64 = 60.0;

const U_WALL: f64 = 0.28;
const U_WINDOW: f64 = 1.3;
const U_ROOF: f64 = 0.20;
const U_GROUND: f64 = 0.35;
/// Temperature correction for heat flow to the ground.
const GROUND_FACTOR: f64 = 0.5;
/// Volumetric heat capacity of air, Wh/(m³·K).
const AIR_HEAT_CAPACITY: f64 = 0.34;
const HEAT_RECOVERY: f64 = 0.7;

const MAX_DUCT_VELOCITY_M_S: f64 = 4.0;
const DUCT_DIAMETERS_MM: [f64; 10] = [100.0, 125.0, 160.0, 200.0, 250.0, 315.0, 400.0, 500.0, 630.0, 800.0];

fn indoor_temperature(space: SpaceType) -> f64 {
    match space {
        SpaceType::Bathroom => 24.0,
        SpaceType::Corridor | SpaceType::Stair | SpaceType::Storage | SpaceType::Technical => 15.0,
        _ => 20.0,
    }
}

fn outdoor_design_temperature(region: Region) -> f64 {
    match region {
        Region::Germany => -12.0,
        Region::Europe => -10.0,
        Region::International => -5.0,
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Airflow {
    outdoor_l_s: f64,
    supply_m3_h: f64,
    extract_m3_h: f64,
}

fn airflow(room: &Room) -> Airflow {
    let occupants = room.occupants();
    let outdoor_l_s = if room.space_type.is_occupied() {
        OUTDOOR_AIR_PER_PERSON_L_S * occupants + OUTDOOR_AIR_PER_M2_L_S * room.area_m2
    } else {
        0.0
    };
    let supply_m3_h = outdoor_l_s * 3.6;
    let extract_m3_h = match room.space_type {
        SpaceType::Kitchen => (KITCHEN_AIR_CHANGES_H * room.volume_m3()).max(supply_m3_h),
        SpaceType::Sanitary | SpaceType::Bathroom => {
            let wc = room.fixture_count(FixtureKind::Wc) as f64;
            let showers = room.fixture_count(FixtureKind::Shower) as f64;
            (EXTRACT_PER_WC_M3_H * wc + EXTRACT_PER_SHOWER_M3_H * showers).max(MIN_SANITARY_EXTRACT_M3_H)
        }
        _ => 0.0,
    };
    Airflow {
        outdoor_l_s,
        supply_m3_h,
        extract_m3_h,
    }
}

#[derive(Debug, Clone, PartialEq)]
struct HeatLoad {
    transmission_w: f64,
    ventilation_w: f64,
}

impl HeatLoad {
    fn total(&self) -> f64 {
        self.transmission_w + self.ventilation_w
    }
}

fn heat_load(room: &Room, air: &Airflow, delta_t: f64, top: bool, bottom: bool) -> HeatLoad {
    let gross_wall = room.exterior_wall_m * room.height_m;
    let window = room.window_area_m2.min(gross_wall);
    let mut ua = U_WALL * (gross_wall - window) + U_WINDOW * window;
    if top {
        ua += U_ROOF * room.area_m2;
    }
    if bottom {
        ua += U_GROUND * GROUND_FACTOR * room.area_m2;
    }
    let air_m3_h = air.supply_m3_h.max(air.extract_m3_h);
    let hv = AIR_HEAT_CAPACITY * air_m3_h * (1.0 - HEAT_RECOVERY);
    HeatLoad {
        transmission_w: (ua * delta_t).max(0.0),
        ventilation_w: (hv * delta_t).max(0.0),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HvacGenerator;

impl DisciplineGenerator for HvacGenerator {
    fn discipline(&self) -> Discipline {
        Discipline::Hvac
    }

    fn design(&self, input: &GenerationInput) -> Result<ArtifactDocument, GenerationError> {
        let building = &input.building;
        let theta_e = outdoor_design_temperature(input.project.region);
        let top_level = building.levels.iter().map(|l| l.index).max().unwrap_or(0);
        let bottom_level = building.levels.iter().map(|l| l.index).min().unwrap_or(0);

        let mut doc = ArtifactDocument::new(self.discipline(), GENERATOR_VERSION);
        let mut ventilation = CalculationTable::new(
            "Ventilation",
            &["Room", "Use", "Persons", "OA l/s", "Supply m³/h", "Extract m³/h", "ACH 1/h", "Duct Ø mm"],
        );
        let mut heating = CalculationTable::new(
            "Heat load",
            &["Room", "θi °C", "ΔT K", "Transmission W", "Ventilation W", "Total W"],
        );

        let mut total_supply = 0.0;
        let mut total_extract = 0.0;
        let mut total_heat = 0.0;
        let mut max_velocity: f64 = 0.0;
        let mut occupants_total = 0.0;

        for room in &building.rooms {
            let volume = room.volume_m3();
            if volume <= 0.0 {
                return Err(GenerationError::new(
                    self.discipline(),
                    format!("room {} has no volume", room.id),
                ));
            }
            let air = airflow(room);
            let occupants = room.occupants();
            let design_m3_h = air.supply_m3_h.max(air.extract_m3_h);
            let theta_i = indoor_temperature(room.space_type);
            let delta_t = theta_i - theta_e;
            let load = heat_load(room, &air, delta_t, room.level == top_level, room.level == bottom_level);

            let mut row = room_row(room);
            row.put("occupants", occupants);
            row.put("outdoor_air_l_s", air.outdoor_l_s);
            row.put("supply_air_m3_h", air.supply_m3_h);
            row.put("air_change_h", design_m3_h / volume);
            if occupants > 0.0 {
                row.put("outdoor_air_l_s_person", air.outdoor_l_s / occupants);
            }
            match room.space_type {
                SpaceType::Kitchen => row.put("kitchen_air_change_h", air.extract_m3_h / volume),
                SpaceType::Sanitary | SpaceType::Bathroom => {
                    row.put("extract_air_m3_h", air.extract_m3_h)
                }
                _ => {}
            }
            row.put("heating_load_w", load.total());

            let mut duct_cell = "-".to_string();
            if design_m3_h > 0.0 {
                let (d, v) = size_round_section(&DUCT_DIAMETERS_MM, design_m3_h / 3600.0, MAX_DUCT_VELOCITY_M_S)
                    .unwrap_or_else(|| {
                        let largest = DUCT_DIAMETERS_MM[DUCT_DIAMETERS_MM.len() - 1];
                        (largest, crate::generate::tables::velocity(design_m3_h / 3600.0, largest))
                    });
                max_velocity = max_velocity.max(v);
                row.put("duct_diameter_mm", d);
                row.put("duct_velocity_m_s", v);
                duct_cell = fmt(d, 0);
            }
            doc.rooms.push(row);

            total_supply += air.supply_m3_h;
            total_extract += air.extract_m3_h;
            total_heat += load.total();
            occupants_total += occupants;

            ventilation.push_row(vec![
                room.id.clone(),
                room.space_type.to_string(),
                fmt(occupants, 1),
                fmt(air.outdoor_l_s, 1),
                fmt(air.supply_m3_h, 0),
                fmt(air.extract_m3_h, 0),
                fmt(design_m3_h / volume, 2),
                duct_cell,
            ]);
            heating.push_row(vec![
                room.id.clone(),
                fmt(theta_i, 0),
                fmt(delta_t, 0),
                fmt(load.transmission_w, 0),
                fmt(load.ventilation_w, 0),
                fmt(load.total(), 0),
            ]);
        }

        let area = building.net_floor_area_m2();
        doc.put("design_outdoor_temperature_c", theta_e);
        doc.put("occupants", occupants_total);
        doc.put("total_supply_air_m3_h", total_supply);
        doc.put("total_extract_air_m3_h", total_extract);
        doc.put("total_heating_load_kw", total_heat / 1000.0);
        doc.put("specific_heating_load_w_m2", total_heat / area);
        doc.put("max_duct_velocity_m_s", max_velocity);
        doc.tables.push(ventilation);
        doc.tables.push(heating);
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::test_support::{room, sample_input};

    #[test]
    fn test_meeting_room_outdoor_air() {
        let doc = HvacGenerator.design(&sample_input(Discipline::Hvac)).expect("design");
        // 40 m² at 0.5 persons/m²: 20 × 7 + 40 × 0.7 = 168 l/s
        let meeting = room(&doc, "L0-R04");
        assert_eq!(meeting.metrics.get("outdoor_air_l_s"), Some(&168.0));
        assert_eq!(meeting.metrics.get("outdoor_air_l_s_person"), Some(&8.4));
        assert_eq!(meeting.metrics.get("duct_diameter_mm"), Some(&250.0));
    }

    #[test]
    fn test_kitchen_and_wc_extract() {
        let doc = HvacGenerator.design(&sample_input(Discipline::Hvac)).expect("design");
        let kitchen = room(&doc, "L0-R06");
        assert_eq!(kitchen.metrics.get("kitchen_air_change_h"), Some(&10.0));
        let wc = room(&doc, "L0-R05");
        assert_eq!(wc.metrics.get("extract_air_m3_h"), Some(&250.0));
        let corridor = room(&doc, "L0-R07");
        assert!(!corridor.metrics.contains_key("duct_diameter_mm"));
    }

    #[test]
    fn test_heat_load_plausible() {
        let doc = HvacGenerator.design(&sample_input(Discipline::Hvac)).expect("design");
        let specific = doc.metric("specific_heating_load_w_m2").expect("specific");
        assert!(specific > 5.0 && specific < 100.0, "{specific}");
        assert!(doc.metric("max_duct_velocity_m_s").expect("velocity") <= 4.0);
        assert_eq!(doc.metric("design_outdoor_temperature_c"), Some(-12.0));
    }

    #[test]
    fn test_top_storey_loses_through_roof() {
        let doc = HvacGenerator.design(&sample_input(Discipline::Hvac)).expect("design");
        let middle = room(&doc, "L1-R02").metrics["heating_load_w"];
        let top = room(&doc, "L2-R02").metrics["heating_load_w"];
        assert!(top > middle);
    }
}
