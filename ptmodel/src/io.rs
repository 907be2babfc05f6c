// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Archivos binarios versionados y volcados WKT

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{bail, Error};
use serde::de::DeserializeOwned;
use serde::Serialize;

use geom::Polygon;

/// Firma de los archivos binarios del modelo
const ARCHIVE_MAGIC: &[u8; 4] = b"PTMB";
/// Versión actual del formato de archivo
const ARCHIVE_VERSION: u32 = 1;

/// Guarda un modelo en un archivo binario etiquetado y versionado
pub fn save_bin<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<(), Error> {
    let file = File::create(path.as_ref())?;
    let mut out = BufWriter::new(file);
    out.write_all(ARCHIVE_MAGIC)?;
    out.write_all(&ARCHIVE_VERSION.to_le_bytes())?;
    bincode::serialize_into(&mut out, value)?;
    out.flush()?;
    Ok(())
}

/// Carga un modelo de un archivo binario, comprobando firma y versión
pub fn load_bin<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T, Error> {
    let file = File::open(path.as_ref())?;
    let mut input = BufReader::new(file);
    let mut magic = [0u8; 4];
    input.read_exact(&mut magic)?;
    if &magic != ARCHIVE_MAGIC {
        bail!("el archivo no es un modelo binario");
    }
    let mut version = [0u8; 4];
    input.read_exact(&mut version)?;
    let version = u32::from_le_bytes(version);
    if version > ARCHIVE_VERSION {
        bail!(
            "versión de archivo {} posterior a la soportada ({})",
            version,
            ARCHIVE_VERSION
        );
    }
    Ok(bincode::deserialize_from(&mut input)?)
}

/// Vuelca una colección de polígonos en formato WKT
pub fn write_wkt<P: AsRef<Path>>(path: P, polygons: &[Polygon]) -> Result<(), Error> {
    let file = File::create(path.as_ref())?;
    let mut out = BufWriter::new(file);
    for polygon in polygons {
        if polygon.is_empty() {
            continue;
        }
        write!(out, "POLYGON ((")?;
        for (i, p) in polygon.iter().enumerate() {
            if i > 0 {
                write!(out, ", ")?;
            }
            write!(out, "{} {}", p.x, p.y)?;
        }
        // WKT cierra el anillo repitiendo el primer vértice
        writeln!(out, ", {} {}))", polygon[0].x, polygon[0].y)?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geom::Point2;

    #[test]
    fn archivo_versionado_ida_y_vuelta() {
        let dir = std::env::temp_dir();
        let path = dir.join("ptmodel_io_test.bin");
        let value: Vec<Point2> = vec![Point2::new(1, 2), Point2::new(3, 4)];
        save_bin(&path, &value).unwrap();
        let loaded: Vec<Point2> = load_bin(&path).unwrap();
        assert_eq!(value, loaded);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn firma_invalida() {
        let dir = std::env::temp_dir();
        let path = dir.join("ptmodel_io_bad.bin");
        std::fs::write(&path, b"XXXX0000datos").unwrap();
        let res: Result<Vec<Point2>, _> = load_bin(&path);
        assert!(res.is_err());
        let _ = std::fs::remove_file(&path);
    }
}
