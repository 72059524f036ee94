use std::fs;
use std::path::PathBuf;

/// Resolves a file under `tests/data`.
pub fn data_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Loads four `x y` corner lines, skipping blank lines and `#` comments.
pub fn load_reference_corners(name: &str) -> [[f64; 2]; 4] {
    let path = data_path(name);
    let text = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));

    let points: Vec<[f64; 2]> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| {
            let mut it = l.split_whitespace().map(|v| v.parse::<f64>().unwrap());
            [it.next().unwrap(), it.next().unwrap()]
        })
        .collect();

    assert_eq!(points.len(), 4, "reference file must hold exactly 4 corners");
    [points[0], points[1], points[2], points[3]]
}
