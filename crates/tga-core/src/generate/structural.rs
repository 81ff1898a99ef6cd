//! Imposed loads and slab sizing.

use crate::domain::{ArtifactDocument, CalculationTable, Discipline, GenerationError, SpaceType};
use crate::generate::tables::fmt;
use crate::generate::{room_row, DisciplineGenerator, GenerationInput, MetricsExt, GENERATOR_VERSION};

/// Slab thicknesses offered by the design, in metres.
const SLAB_DEPTHS_M: [f64; 7] = [0.18, 0.20, 0.22, 0.25, 0.28, 0.30, 0.35];

/// Target span/effective depth ratio for one-way slabs.
const SPAN_DEPTH_TARGET: f64 = 25.0;

const CONCRETE_KN_M3: f64 = 25.0;
const FINISHES_KN_M2: f64 = 1.5;
const GAMMA_G: f64 = 1.35;
const GAMMA_Q: f64 = 1.5;

/// Imposed floor load category and value in kN/m².
fn imposed_load(space: SpaceType) -> (&'static str, f64) {
    match space {
        SpaceType::Living | SpaceType::Bedroom => ("A", 2.0),
        SpaceType::Bathroom | SpaceType::Sanitary => ("A", 2.0),
        SpaceType::Ward => ("A", 2.0),
        SpaceType::Office => ("B", 3.0),
        SpaceType::Kitchen | SpaceType::Other => ("B", 3.0),
        SpaceType::Meeting | SpaceType::Classroom => ("C1", 3.0),
        SpaceType::Corridor | SpaceType::Stair => ("C3", 3.0),
        SpaceType::Retail => ("D1", 4.0),
        SpaceType::Technical | SpaceType::Production => ("E2", 5.0),
        SpaceType::Storage => ("E1", 7.5),
    }
}

fn slab_depth(span_m: f64) -> f64 {
    SLAB_DEPTHS_M
        .iter()
        .copied()
        .find(|d| span_m / d <= SPAN_DEPTH_TARGET)
        .unwrap_or(SLAB_DEPTHS_M[SLAB_DEPTHS_M.len() - 1])
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralGenerator;

impl DisciplineGenerator for StructuralGenerator {
    fn discipline(&self) -> Discipline {
        Discipline::Structural
    }

    fn design(&self, input: &GenerationInput) -> Result<ArtifactDocument, GenerationError> {
        let mut doc = ArtifactDocument::new(self.discipline(), GENERATOR_VERSION);
        let mut slabs = CalculationTable::new(
            "Slab schedule",
            &["Room", "Level", "Category", "q kN/m²", "Span m", "Depth mm", "L/d", "ULS kN/m²"],
        );

        let mut max_span: f64 = 0.0;
        let mut max_ratio: f64 = 0.0;
        let mut min_load = f64::INFINITY;
        let mut total_imposed = 0.0;
        let mut total_design = 0.0;

        for room in &input.building.rooms {
            let span = room.short_side_m;
            if span <= 0.0 {
                return Err(GenerationError::new(
                    self.discipline(),
                    format!("room {} has no measurable span", room.id),
                ));
            }
            let (category, q) = imposed_load(room.space_type);
            let depth = slab_depth(span);
            let ratio = span / depth;
            let self_weight = depth * CONCRETE_KN_M3;
            let design_load = GAMMA_G * (self_weight + FINISHES_KN_M2) + GAMMA_Q * q;

            max_span = max_span.max(span);
            max_ratio = max_ratio.max(ratio);
            min_load = min_load.min(q);
            total_imposed += q * room.area_m2;
            total_design += design_load * room.area_m2;

            let mut row = room_row(room);
            row.put("imposed_load_kn_m2", q);
            row.put("span_m", span);
            row.put("slab_depth_m", depth);
            row.put("span_depth_ratio", ratio);
            row.put("self_weight_kn_m2", self_weight);
            row.put("design_load_kn_m2", design_load);
            doc.rooms.push(row);

            slabs.push_row(vec![
                room.id.clone(),
                room.level.to_string(),
                category.to_string(),
                fmt(q, 1),
                fmt(span, 2),
                fmt(depth * 1000.0, 0),
                fmt(ratio, 1),
                fmt(design_load, 2),
            ]);
        }

        doc.put("max_span_m", max_span);
        doc.put("max_span_depth_ratio", max_ratio);
        doc.put("min_imposed_load_kn_m2", min_load);
        doc.put("total_imposed_load_kn", total_imposed);
        doc.put("total_design_load_kn", total_design);
        doc.tables.push(slabs);
        Ok(doc)
    }
}
