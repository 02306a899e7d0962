use std::{fs, path::Path};

use log::debug;
use ndarray::{Array1, Array4};

use super::InMemoryDataset;
use crate::{MlErr, Result};

/// Loads an image dataset from a CSV file where every row is `label,p0,p1,...` and the pixels
/// are laid out channel by channel, row by row.
///
/// Blank lines are ignored, and so is a first line whose label isn't a number (a header).
///
/// # Arguments
/// * `path` - The CSV file.
/// * `image_dim` - The `(c, h, w)` shape of every image.
/// * `num_classes` - The amount of classes, inferred from the largest label if `None`.
/// * `scale` - A factor every pixel is multiplied by, e.g. `1 / 255` for 8 bit images.
///
/// # Returns
/// The dataset or an error naming the first offending line.
pub fn load_csv<P: AsRef<Path>>(
    path: P,
    image_dim: (usize, usize, usize),
    num_classes: Option<usize>,
    scale: f32,
) -> Result<InMemoryDataset> {
    let content = fs::read_to_string(path.as_ref())?;
    let (c, h, w) = image_dim;
    let pixels = c * h * w;

    let mut labels = Vec::new();
    let mut data = Vec::new();

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut fields = line.split(',').map(str::trim);
        let label = match fields.next().map(str::parse::<usize>) {
            Some(Ok(label)) => label,
            Some(Err(_)) if i == 0 => continue,
            _ => {
                return Err(MlErr::InvalidData {
                    line: i + 1,
                    msg: "cannot parse the label".into(),
                });
            }
        };

        let start = data.len();
        for v in fields {
            let v = v.parse::<f32>().map_err(|_| MlErr::InvalidData {
                line: i + 1,
                msg: format!("cannot parse '{v}' as a pixel"),
            })?;

            data.push(v * scale);
        }

        let got = data.len() - start;
        if got != pixels {
            return Err(MlErr::InvalidData {
                line: i + 1,
                msg: format!("expected {pixels} pixels, got {got}"),
            });
        }

        labels.push(label);
    }

    let num_classes = num_classes
        .or_else(|| labels.iter().max().map(|&max| max + 1))
        .ok_or(MlErr::EmptyDataset)?;

    debug!(
        "loaded {} samples of shape {image_dim:?} with {num_classes} classes",
        labels.len()
    );

    let images = Array4::from_shape_vec((labels.len(), c, h, w), data)?;
    InMemoryDataset::new(images, Array1::from(labels), num_classes)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn csv_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_rows_and_skips_the_header() {
        let file = csv_file("label,a,b,c,d\n1,0,2,0,2\n\n0,2,2,2,2\n");
        let dataset = load_csv(file.path(), (1, 2, 2), None, 0.5).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.num_classes(), 2);

        let batch = dataset.select(&[0, 1]);
        assert_eq!(batch.y.to_vec(), vec![1, 0]);
        assert_eq!(batch.x[[0, 0, 0, 1]], 1.);
        assert_eq!(batch.x[[0, 0, 1, 0]], 0.);
    }

    #[test]
    fn reports_the_line_of_a_short_row() {
        let file = csv_file("0,1,2,3,4\n1,1,2\n");
        let err = load_csv(file.path(), (1, 2, 2), Some(2), 1.).unwrap_err();
        assert!(matches!(err, MlErr::InvalidData { line: 2, .. }));
    }

    #[test]
    fn reports_unparsable_pixels() {
        let file = csv_file("0,1,x,3,4\n");
        assert!(matches!(
            load_csv(file.path(), (1, 2, 2), Some(2), 1.),
            Err(MlErr::InvalidData { line: 1, .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            load_csv("/definitely/not/here.csv", (1, 1, 1), None, 1.),
            Err(MlErr::Io(_))
        ));
    }
}
