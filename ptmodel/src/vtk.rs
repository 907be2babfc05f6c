// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Volcado VTK 2.0 ASCII del modelo de prismas
//!
//! Malla no estructurada con celdas de cuña (tipo 13) para los prismas y
//! líneas (tipo 3) para los segmentos de hilo; opcionalmente un bloque
//! CELL_DATA con las temperaturas por elemento y una rampa de color.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{ensure, Error};

use crate::prism::PrismThermalModel;

/// Entradas de la rampa de color de temperaturas
const RAMP_SIZE: usize = 100;

/// Escribe el modelo en formato VTK; `temperatures` por elemento, opcional
pub fn write_vtk<P: AsRef<Path>>(
    model: &PrismThermalModel,
    path: P,
    temperatures: Option<&[f64]>,
) -> Result<(), Error> {
    if let Some(temps) = temperatures {
        ensure!(
            temps.len() == model.total_elements(),
            "se esperaba una temperatura por elemento"
        );
    }
    let file = File::create(path.as_ref())?;
    let mut out = BufWriter::new(file);

    writeln!(out, "# vtk DataFile Version 2.0")?;
    writeln!(out, "Unstructured Grid")?;
    writeln!(out, "ASCII")?;
    writeln!(out, "DATASET UNSTRUCTURED_GRID")?;

    let points = model.points();
    writeln!(out, "POINTS {} double", points.len())?;
    for p in points {
        writeln!(out, "{} {} {}", p.x, p.y, p.z)?;
    }

    let prisms = model.total_prism_elements();
    let lines = model.total_line_elements();
    let total = prisms + lines;
    writeln!(out, "CELLS {} {}", total, prisms * 7 + lines * 3)?;
    for prism in model.prisms() {
        let v = &prism.vertices;
        writeln!(out, "6 {} {} {} {} {} {}", v[0], v[1], v[2], v[3], v[4], v[5])?;
    }
    for line in model.lines() {
        writeln!(out, "2 {} {}", line.end_pts[0], line.end_pts[1])?;
    }
    writeln!(out, "CELL_TYPES {}", total)?;
    for _ in 0..prisms {
        writeln!(out, "13")?;
    }
    for _ in 0..lines {
        writeln!(out, "3")?;
    }

    if let Some(temps) = temperatures {
        writeln!(out, "CELL_DATA {}", total)?;
        writeln!(out, "SCALARS TEMPERATURE double 1")?;
        writeln!(out, "LOOKUP_TABLE TEMPERATURE")?;
        for t in temps {
            writeln!(out, "{}", t)?;
        }
        // rampa azul → rojo
        writeln!(out, "LOOKUP_TABLE TEMPERATURE {}", RAMP_SIZE)?;
        for i in 0..RAMP_SIZE {
            let t = i as f64 / (RAMP_SIZE - 1) as f64;
            writeln!(out, "{:.3} {:.3} {:.3} 1.000", t, 0.0, 1.0 - t)?;
        }
    }
    out.flush()?;
    Ok(())
}
