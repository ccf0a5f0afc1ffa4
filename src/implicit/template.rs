//! Template URI substitution for subtree and content URIs

use crate::implicit::coordinates::TreeCoordinates;

/// Replace `{level}`, `{x}`, `{y}` (and `{z}` for octrees) in `template`.
///
/// Replacement is literal; unknown tokens are left as they are.
pub fn substitute(template: &str, coordinates: &TreeCoordinates) -> String {
    let [x, y, z] = coordinates.xyz();
    let uri = template
        .replace("{level}", &coordinates.level().to_string())
        .replace("{x}", &x.to_string())
        .replace("{y}", &y.to_string());
    match coordinates {
        TreeCoordinates::Octree(_) => uri.replace("{z}", &z.to_string()),
        TreeCoordinates::Quadtree(_) => uri,
    }
}
