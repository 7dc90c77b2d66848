//! ASCII frame composition for the terminal demo.

use gridsweep_core::CellCoord;
use gridsweep_system_sweep::{FlashMarker, SweeperSnapshot};

/// Character used for empty cells.
pub(crate) const BLANK: char = ' ';

/// Trail glyphs from faintest to brightest.
const TRAIL_RAMP: [char; 3] = ['.', ':', '-'];

fn trail_glyph(intensity: f32) -> char {
    let level = (intensity.clamp(0.0, 1.0) * TRAIL_RAMP.len() as f32) as usize;
    TRAIL_RAMP[level.min(TRAIL_RAMP.len() - 1)]
}

fn slot(canvas: &mut [Vec<char>], cell: CellCoord) -> Option<&mut char> {
    canvas
        .get_mut(cell.row() as usize)?
        .get_mut(cell.column() as usize)
}

/// Overlays trails on empty cells and flash markers on top of everything
/// else, then joins the rows into one frame.
pub(crate) fn compose(
    rows: &[String],
    sweepers: &[SweeperSnapshot],
    flashes: &[FlashMarker],
) -> String {
    let mut canvas: Vec<Vec<char>> = rows.iter().map(|row| row.chars().collect()).collect();

    for sweeper in sweepers {
        for point in &sweeper.trail {
            if let Some(glyph) = slot(&mut canvas, point.cell) {
                if *glyph == BLANK {
                    *glyph = trail_glyph(point.intensity);
                }
            }
        }
    }
    for marker in flashes {
        if let Some(glyph) = slot(&mut canvas, marker.cell) {
            *glyph = marker.glyph;
        }
    }

    let width = canvas.first().map_or(0, Vec::len);
    let border: String = std::iter::repeat('-').take(width + 2).collect();
    let mut frame = String::with_capacity((width + 3) * (canvas.len() + 2));
    frame.push_str(&border);
    frame.push('\n');
    for row in canvas {
        frame.push('|');
        frame.extend(row);
        frame.push_str("|\n");
    }
    frame.push_str(&border);
    frame
}
