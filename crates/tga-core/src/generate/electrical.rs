//! Small power, circuits and main feeder sizing.
//!
//! Socket outlets are laid out along the usable wall length at the room's
//! spacing and compared with the area-based minimum equipment. The connected
//! load is reduced by the category demand factor to give the design current
//! of the three-phase main feeder, which is then sized for ampacity and for
//! voltage drop.

use std::collections::BTreeMap;

use crate::domain::{
    ArtifactDocument, BuildingCategory, CalculationTable, Discipline, GenerationError, Room,
    SpaceType,
};
use crate::generate::tables::{first_covering, fmt};
use crate::generate::{room_row, DisciplineGenerator, GenerationInput, MetricsExt, GENERATOR_VERSION};

/// Socket planning per space type.
struct SocketRule {
    per_m2: f64,
    min: u32,
    spacing_m: f64,
    load_w_m2: f64,
}

const fn rule(per_m2: f64, min: u32, spacing_m: f64, load_w_m2: f64) -> SocketRule {
    SocketRule {
        per_m2,
        min,
        spacing_m,
        load_w_m2,
    }
}

fn socket_rule(space: SpaceType) -> SocketRule {
    match space {
        SpaceType::Office => rule(0.2, 4, 2.5, 15.0),
        SpaceType::Meeting => rule(0.15, 4, 3.0, 10.0),
        SpaceType::Classroom => rule(0.1, 6, 3.0, 10.0),
        SpaceType::Living => rule(0.25, 5, 2.0, 10.0),
        SpaceType::Bedroom => rule(0.2, 4, 2.5, 8.0),
        SpaceType::Kitchen => rule(0.4, 5, 1.0, 150.0),
        SpaceType::Sanitary => rule(0.0, 1, 4.0, 5.0),
        SpaceType::Bathroom => rule(0.0, 2, 2.0, 20.0),
        SpaceType::Corridor => rule(0.0, 1, 10.0, 2.0),
        SpaceType::Stair => rule(0.0, 0, 0.0, 1.0),
        SpaceType::Storage => rule(0.0, 1, 10.0, 2.0),
        SpaceType::Technical => rule(0.1, 2, 3.0, 50.0),
        SpaceType::Retail => rule(0.1, 4, 4.0, 20.0),
        SpaceType::Ward => rule(0.3, 6, 1.5, 15.0),
        SpaceType::Production => rule(0.1, 4, 4.0, 60.0),
        SpaceType::Other => rule(0.1, 2, 4.0, 10.0),
    }
}

const DOOR_WIDTH_M: f64 = 0.9;
/// Closest spacing of double outlets when the nominal spacing falls short.
const MIN_SOCKET_SPACING_M: f64 = 0.6;
const SOCKETS_PER_CIRCUIT: u32 = 8;
const LIGHTING_W_M2: f64 = 8.0;
/// Floor area served by one lighting circuit.
const LIGHTING_CIRCUIT_M2: f64 = 100.0;
/// Distribution boards are assembled from 12-way rows.
const BOARD_ROW_WAYS: u32 = 12;
const BOARD_RESERVE: f64 = 0.25;

const VOLTAGE_V: f64 = 400.0;
const POWER_FACTOR: f64 = 0.9;
/// Copper conductivity in m/(Ω·mm²).
const KAPPA: f64 = 56.0;
/// Meter cabinet to the riser foot.
const FEEDER_BASE_LENGTH_M: f64 = 15.0;
const GROUPING_DERATING: f64 = 0.8;
/// Feeders are upsized until the drop is within this.
const VOLTAGE_DROP_TARGET_PCT: f64 = 3.0;
const MAX_PARALLEL_CABLES: u32 = 4;

/// Copper, PVC, installation method C: (mm², ampacity A).
const CABLE_AMPACITY: [(f64, f64); 15] = [
    (1.5, 19.5),
    (2.5, 27.0),
    (4.0, 36.0),
    (6.0, 46.0),
    (10.0, 63.0),
    (16.0, 85.0),
    (25.0, 112.0),
    (35.0, 138.0),
    (50.0, 168.0),
    (70.0, 213.0),
    (95.0, 258.0),
    (120.0, 299.0),
    (150.0, 344.0),
    (185.0, 392.0),
    (240.0, 461.0),
];

fn demand_factor(category: BuildingCategory) -> f64 {
    match category {
        BuildingCategory::Residential => 0.5,
        BuildingCategory::Office | BuildingCategory::Healthcare => 0.7,
        BuildingCategory::Industrial | BuildingCategory::Retail => 0.8,
        BuildingCategory::Education => 0.6,
    }
}

#[derive(Debug, Clone, PartialEq)]
struct SocketLayout {
    required: u32,
    placed: u32,
    circuits: u32,
}

fn layout_sockets(room: &Room) -> Option<SocketLayout> {
    let rule = socket_rule(room.space_type);
    if rule.min == 0 && rule.per_m2 == 0.0 {
        return None;
    }
    let required = rule.min.max((room.area_m2 * rule.per_m2).ceil() as u32);
    let usable = (room.perimeter_m - DOOR_WIDTH_M * room.doors as f64).max(0.0);
    let nominal = (usable / rule.spacing_m).floor() as u32;
    let placed = if nominal >= required {
        nominal
    } else {
        required.min((usable / MIN_SOCKET_SPACING_M).floor() as u32)
    };
    let circuits = placed.div_ceil(SOCKETS_PER_CIRCUIT).max(1);
    Some(SocketLayout {
        required,
        placed,
        circuits,
    })
}

/// Selected main feeder.
#[derive(Debug, Clone, PartialEq)]
struct Feeder {
    cross_section_mm2: f64,
    parallel: u32,
    ampacity_a: f64,
    voltage_drop_pct: f64,
}

fn voltage_drop_pct(current_a: f64, length_m: f64, conductor_mm2: f64) -> f64 {
    let drop_v = 3f64.sqrt() * current_a * length_m * POWER_FACTOR / (KAPPA * conductor_mm2);
    drop_v / VOLTAGE_V * 100.0
}

fn select_feeder(current_a: f64, length_m: f64) -> Option<Feeder> {
    for parallel in 1..=MAX_PARALLEL_CABLES {
        let n = parallel as f64;
        let per_cable = current_a / n;
        let start = CABLE_AMPACITY
            .iter()
            .position(|(_, amps)| amps * GROUPING_DERATING >= per_cable);
        let Some(start) = start else { continue };
        for &(mm2, amps) in &CABLE_AMPACITY[start..] {
            let vd = voltage_drop_pct(current_a, length_m, mm2 * n);
            if vd <= VOLTAGE_DROP_TARGET_PCT {
                return Some(Feeder {
                    cross_section_mm2: mm2,
                    parallel,
                    ampacity_a: amps * GROUPING_DERATING * n,
                    voltage_drop_pct: vd,
                });
            }
        }
    }
    None
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ElectricalGenerator;

impl DisciplineGenerator for ElectricalGenerator {
    fn discipline(&self) -> Discipline {
        Discipline::Electrical
    }

    fn design(&self, input: &GenerationInput) -> Result<ArtifactDocument, GenerationError> {
        let building = &input.building;
        let mut doc = ArtifactDocument::new(self.discipline(), GENERATOR_VERSION);
        let mut sockets = CalculationTable::new(
            "Socket outlets",
            &["Room", "Level", "Use", "Required", "Placed", "Circuits", "Load W", "RCD"],
        );

        let mut connected_w = 0.0;
        let mut socket_count = 0u32;
        let mut circuits_by_level: BTreeMap<usize, u32> = BTreeMap::new();

        for room in &building.rooms {
            let rule = socket_rule(room.space_type);
            let load = room.area_m2 * (rule.load_w_m2 + LIGHTING_W_M2);
            connected_w += load;

            let mut row = room_row(room);
            row.put("load_w", load);
            let layout = layout_sockets(room);
            if let Some(layout) = &layout {
                socket_count += layout.placed;
                *circuits_by_level.entry(room.level).or_insert(0) += layout.circuits;
                row.put("sockets_required", layout.required as f64);
                row.put("sockets_placed", layout.placed as f64);
                row.put("socket_coverage", layout.placed as f64 / layout.required.max(1) as f64);
                row.put("circuits", layout.circuits as f64);
                row.put(
                    "sockets_per_circuit",
                    layout.placed as f64 / layout.circuits as f64,
                );
            }
            if room.space_type.is_wet() {
                row.put("rcd_protected", 1.0);
            }
            doc.rooms.push(row);

            let (required, placed, circuits) = layout
                .as_ref()
                .map(|l| (l.required.to_string(), l.placed.to_string(), l.circuits.to_string()))
                .unwrap_or_else(|| ("-".into(), "-".into(), "-".into()));
            sockets.push_row(vec![
                room.id.clone(),
                room.level.to_string(),
                room.space_type.to_string(),
                required,
                placed,
                circuits,
                fmt(load, 0),
                if room.space_type.is_wet() { "30 mA" } else { "-" }.to_string(),
            ]);
        }

        let mut boards = CalculationTable::new(
            "Distribution boards",
            &["Level", "Circuits", "Ways", "Spare %"],
        );
        let mut total_circuits = 0;
        let mut total_ways = 0;
        let mut min_spare = f64::INFINITY;
        for (level, area) in building.area_by_level() {
            let lighting = ((area / LIGHTING_CIRCUIT_M2).ceil() as u32).max(1);
            let circuits = circuits_by_level.get(&level).copied().unwrap_or(0) + lighting;
            let needed = (circuits as f64 * (1.0 + BOARD_RESERVE)).ceil() as u32;
            let ways = needed.div_ceil(BOARD_ROW_WAYS) * BOARD_ROW_WAYS;
            let spare = (ways - circuits) as f64 / ways as f64 * 100.0;
            min_spare = min_spare.min(spare);
            total_circuits += circuits;
            total_ways += ways;
            boards.push_row(vec![
                level.to_string(),
                circuits.to_string(),
                ways.to_string(),
                fmt(spare, 1),
            ]);
        }

        let factor = demand_factor(input.project.category);
        let demand_w = connected_w * factor;
        let current = demand_w / (3f64.sqrt() * VOLTAGE_V * POWER_FACTOR);
        let building_height: f64 = building.levels.iter().map(|l| l.storey_height_m).sum();
        let length = FEEDER_BASE_LENGTH_M + building_height;
        let feeder = select_feeder(current, length).ok_or_else(|| {
            GenerationError::new(
                self.discipline(),
                format!(
                    "design current {current:.0} A exceeds {MAX_PARALLEL_CABLES} parallel {} mm² cables",
                    CABLE_AMPACITY[CABLE_AMPACITY.len() - 1].0
                ),
            )
        })?;
        // Smallest section that carries the current, before any voltage-drop upsizing.
        let by_ampacity = first_covering(&CABLE_AMPACITY, current / feeder.parallel as f64 / GROUPING_DERATING)
            .map_or(feeder.cross_section_mm2, |(mm2, _)| mm2);

        let mut feeder_table = CalculationTable::new("Main feeder", &["Parameter", "Value", "Unit"]);
        for (name, value, unit) in [
            ("Connected load", fmt(connected_w / 1000.0, 1), "kW"),
            ("Demand factor", fmt(factor, 2), "-"),
            ("Demand load", fmt(demand_w / 1000.0, 1), "kW"),
            ("Design current", fmt(current, 1), "A"),
            ("Cable length", fmt(length, 1), "m"),
            ("Section by ampacity", fmt(by_ampacity, 1), "mm²"),
            (
                "Selected cable",
                format!("{} × {}", feeder.parallel, fmt(feeder.cross_section_mm2, 1)),
                "mm²",
            ),
            ("Derated ampacity", fmt(feeder.ampacity_a, 1), "A"),
            ("Voltage drop", fmt(feeder.voltage_drop_pct, 2), "%"),
        ] {
            feeder_table.push_row(vec![name.to_string(), value, unit.to_string()]);
        }

        doc.put("connected_load_kw", connected_w / 1000.0);
        doc.put("demand_factor", factor);
        doc.put("demand_load_kw", demand_w / 1000.0);
        doc.put("design_current_a", current);
        doc.put("cable_length_m", length);
        doc.put("main_cable_mm2", feeder.cross_section_mm2);
        doc.put("parallel_cables", feeder.parallel as f64);
        doc.put("cable_ampacity_a", feeder.ampacity_a);
        doc.put("cable_utilisation", current / feeder.ampacity_a);
        doc.put("voltage_drop_pct", feeder.voltage_drop_pct);
        doc.put("socket_count", socket_count as f64);
        doc.put("circuit_count", total_circuits as f64);
        doc.put("board_ways", total_ways as f64);
        if min_spare.is_finite() {
            doc.put("board_spare_pct", min_spare);
        }
        doc.tables.push(sockets);
        doc.tables.push(boards);
        doc.tables.push(feeder_table);
        Ok(doc)
    }
}
