//! Drinking water peak flow and wastewater stack sizing.

use crate::domain::{
    ArtifactDocument, BuildingCategory, CalculationTable, Discipline, FixtureKind,
    GenerationError, Room,
};
use crate::generate::tables::{first_covering, fmt, size_round_section};
use crate::generate::{room_row, DisciplineGenerator, GenerationInput, MetricsExt, GENERATOR_VERSION};

const FIXTURE_KINDS: [FixtureKind; 5] = [
    FixtureKind::Wc,
    FixtureKind::Washbasin,
    FixtureKind::Shower,
    FixtureKind::Sink,
    FixtureKind::Dishwasher,
];

/// Design flow rate QR in l/s.
fn design_flow(kind: FixtureKind) -> f64 {
    match kind {
        FixtureKind::Washbasin | FixtureKind::Sink | FixtureKind::Dishwasher => 0.07,
        FixtureKind::Wc => 0.13,
        FixtureKind::Shower => 0.15,
    }
}

/// Discharge unit DU in l/s.
fn discharge_units(kind: FixtureKind) -> f64 {
    match kind {
        FixtureKind::Washbasin => 0.5,
        FixtureKind::Sink | FixtureKind::Dishwasher => 0.8,
        FixtureKind::Wc => 2.0,
        FixtureKind::Shower => 0.6,
    }
}

/// Peak flow constants `(a, b, c)` of `Qd = a · ΣQR^b − c`.
fn peak_constants(category: BuildingCategory) -> (f64, f64, f64) {
    match category {
        BuildingCategory::Residential => (1.48, 0.19, 0.94),
        BuildingCategory::Healthcare => (0.75, 0.44, 0.18),
        BuildingCategory::Office
        | BuildingCategory::Education
        | BuildingCategory::Retail
        | BuildingCategory::Industrial => (0.91, 0.31, 0.38),
    }
}

/// Frequency factor K of the wastewater flow `Qww = K · √ΣDU`.
fn frequency_factor(category: BuildingCategory) -> f64 {
    match category {
        BuildingCategory::Residential
        | BuildingCategory::Office
        | BuildingCategory::Retail
        | BuildingCategory::Industrial => 0.5,
        BuildingCategory::Healthcare | BuildingCategory::Education => 0.7,
    }
}

/// Below this summated flow the simultaneity curve does not apply.
const SIMULTANEITY_THRESHOLD_L_S: f64 = 0.2;
const MAX_PIPE_VELOCITY_M_S: f64 = 2.0;
/// Copper tube inner diameters, mm.
const RISER_DIAMETERS_MM: [f64; 11] = [13.0, 16.0, 20.0, 25.0, 32.0, 39.0, 50.0, 60.0, 72.1, 84.9, 103.0];
/// Stack capacity with primary ventilation: (DN, l/s).
const STACK_CAPACITY: [(u32, f64); 8] = [
    (60, 0.5),
    (70, 1.5),
    (80, 2.0),
    (90, 2.7),
    (100, 4.0),
    (125, 5.8),
    (150, 9.5),
    (200, 16.0),
];
/// Stacks receiving WCs are at least DN 100.
const WC_MIN_STACK_DN: u32 = 100;

/// Peak demand flow `Qd` for a summated flow `ΣQR`.
pub fn peak_flow(category: BuildingCategory, sum_qr: f64, max_single: f64) -> f64 {
    if sum_qr <= SIMULTANEITY_THRESHOLD_L_S {
        return sum_qr;
    }
    let (a, b, c) = peak_constants(category);
    (a * sum_qr.powf(b) - c).clamp(max_single, sum_qr)
}

fn counts(room: &Room) -> [usize; 5] {
    FIXTURE_KINDS.map(|k| room.fixture_count(k))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HydraulicGenerator;

impl DisciplineGenerator for HydraulicGenerator {
    fn discipline(&self) -> Discipline {
        Discipline::Hydraulic
    }

    fn design(&self, input: &GenerationInput) -> Result<ArtifactDocument, GenerationError> {
        let category = input.project.category;
        let mut doc = ArtifactDocument::new(self.discipline(), GENERATOR_VERSION);
        let mut fixtures = CalculationTable::new(
            "Fixtures",
            &["Room", "Level", "WC", "Basin", "Shower", "Sink", "Dishwasher", "ΣQR l/s", "ΣDU l/s"],
        );

        let mut sum_qr = 0.0;
        let mut sum_du = 0.0;
        let mut max_qr: f64 = 0.0;
        let mut max_du: f64 = 0.0;
        let mut fixture_count = 0;
        let mut has_wc = false;

        for room in &input.building.rooms {
            if room.fixtures.is_empty() {
                continue;
            }
            let room_qr: f64 = room.fixtures.iter().map(|f| design_flow(f.kind)).sum();
            let room_du: f64 = room.fixtures.iter().map(|f| discharge_units(f.kind)).sum();
            for f in &room.fixtures {
                max_qr = max_qr.max(design_flow(f.kind));
                max_du = max_du.max(discharge_units(f.kind));
            }
            sum_qr += room_qr;
            sum_du += room_du;
            fixture_count += room.fixtures.len();
            let n = counts(room);
            has_wc |= n[0] > 0;

            let mut row = room_row(room);
            for (kind, count) in FIXTURE_KINDS.iter().zip(n) {
                row.put(&format!("{}_count", fixture_name(*kind)), count as f64);
            }
            row.put("qr_sum_l_s", room_qr);
            row.put("du_sum_l_s", room_du);
            doc.rooms.push(row);

            let mut cells = vec![room.id.clone(), room.level.to_string()];
            cells.extend(n.iter().map(|c| c.to_string()));
            cells.push(fmt(room_qr, 2));
            cells.push(fmt(room_du, 1));
            fixtures.push_row(cells);
        }

        let qd = peak_flow(category, sum_qr, max_qr);
        let (riser_mm, riser_v) = size_round_section(&RISER_DIAMETERS_MM, qd / 1000.0, MAX_PIPE_VELOCITY_M_S)
            .ok_or_else(|| {
                GenerationError::new(
                    self.discipline(),
                    format!("peak flow {qd:.2} l/s exceeds the largest riser"),
                )
            })?;

        let qww = if sum_du > 0.0 {
            (frequency_factor(category) * sum_du.sqrt()).max(max_du)
        } else {
            0.0
        };
        let candidates: Vec<(u32, f64)> = STACK_CAPACITY
            .iter()
            .copied()
            .filter(|(dn, _)| !has_wc || *dn >= WC_MIN_STACK_DN)
            .collect();
        let (stack_dn, stack_capacity) = first_covering(&candidates, qww)
            .unwrap_or(STACK_CAPACITY[STACK_CAPACITY.len() - 1]);

        let wc_count: usize = input
            .building
            .rooms
            .iter()
            .map(|r| r.fixture_count(FixtureKind::Wc))
            .sum();
        let occupants: f64 = input.building.rooms.iter().map(|r| r.occupants()).sum();

        let mut sizing = CalculationTable::new("Riser and stack", &["Parameter", "Value", "Unit"]);
        for (name, value, unit) in [
            ("Summated flow ΣQR", fmt(sum_qr, 2), "l/s"),
            ("Peak flow Qd", fmt(qd, 2), "l/s"),
            ("Riser inner diameter", fmt(riser_mm, 1), "mm"),
            ("Riser velocity", fmt(riser_v, 2), "m/s"),
            ("Discharge units ΣDU", fmt(sum_du, 1), "l/s"),
            ("Wastewater flow Qww", fmt(qww, 2), "l/s"),
            ("Stack", format!("DN {stack_dn}"), "-"),
            ("Stack capacity", fmt(stack_capacity, 1), "l/s"),
        ] {
            sizing.push_row(vec![name.to_string(), value, unit.to_string()]);
        }

        doc.put("fixture_count", fixture_count as f64);
        doc.put("qr_sum_l_s", sum_qr);
        doc.put("peak_flow_l_s", qd);
        doc.put("riser_inner_diameter_mm", riser_mm);
        doc.put("riser_velocity_m_s", riser_v);
        doc.put("du_sum_l_s", sum_du);
        doc.put("wastewater_flow_l_s", qww);
        doc.put("stack_dn", stack_dn as f64);
        doc.put("stack_capacity_l_s", stack_capacity);
        doc.put("stack_utilisation", qww / stack_capacity);
        doc.put("wc_count", wc_count as f64);
        doc.put("occupants", occupants);
        doc.put("occupants_per_wc", occupants / wc_count.max(1) as f64);
        doc.tables.push(fixtures);
        doc.tables.push(sizing);
        Ok(doc)
    }
}

fn fixture_name(kind: FixtureKind) -> &'static str {
    match kind {
        FixtureKind::Wc => "wc",
        FixtureKind::Washbasin => "washbasin",
        FixtureKind::Shower => "shower",
        FixtureKind::Sink => "sink",
        FixtureKind::Dishwasher => "dishwasher",
    }
}
