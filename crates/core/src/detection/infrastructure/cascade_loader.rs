//! Cascade files on disk: OpenCV's `opencv-cascade-classifier` XML (the
//! layout of the `haarcascade_*.xml` files shipped with OpenCV) or this
//! crate's JSON.
//!
//! Only the parts of the XML layout a Haar stump cascade uses are read:
//!
//! ```xml
//! <cascade>
//!   <featureType>HAAR</featureType>
//!   <height>20</height><width>20</width>
//!   <stages><_>
//!     <stageThreshold>0.82</stageThreshold>
//!     <weakClassifiers><_>
//!       <internalNodes>0 -1 0 4.0e-03</internalNodes>
//!       <leafValues>0.03 0.84</leafValues>
//!     </_></weakClassifiers>
//!   </_></stages>
//!   <features><_>
//!     <rects><_>3 7 14 4 -1.</_><_>3 9 14 2 2.</_></rects>
//!   </_></features>
//! </cascade>
//! ```
use std::path::Path;
use std::str::FromStr;

use roxmltree::{Document, Node};

use crate::detection::domain::haar_cascade::{
    CascadeError, HaarCascade, HaarFeature, Stage, WeakClassifier, WeightedRect,
};

/// OpenCV lowers every stage threshold by this much when it loads a cascade.
const STAGE_THRESHOLD_EPS: f32 = 1e-5;

/// OpenCV normalizes over the window minus a one-pixel border.
const OPENCV_NORM_INSET: u32 = 1;

/// Loads `path` as OpenCV XML when it ends in `.xml`, as JSON otherwise.
pub fn load(path: &Path) -> Result<HaarCascade, CascadeError> {
    let text = std::fs::read_to_string(path)?;
    let is_xml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xml"));
    if is_xml {
        from_opencv_xml(&text)
    } else {
        HaarCascade::from_json(&text)
    }
}

pub fn from_opencv_xml(text: &str) -> Result<HaarCascade, CascadeError> {
    let doc = Document::parse(text)?;
    let Some(root) = doc.descendants().find(|n| n.has_tag_name("cascade")) else {
        return Err(invalid(
            "no <cascade> element; pre-2.4 OpenCV cascades must be converted first",
        ));
    };

    if let Some(kind) = child(root, "featureType").and_then(|n| n.text()) {
        if !kind.trim().eq_ignore_ascii_case("HAAR") {
            return Err(invalid(format!("unsupported feature type {}", kind.trim())));
        }
    }

    let window_width = single(required(root, "width")?)?;
    let window_height = single(required(root, "height")?)?;
    let features = items(required(root, "features")?)
        .enumerate()
        .map(|(i, node)| parse_feature(node).map_err(|e| context(e, format!("feature {i}"))))
        .collect::<Result<Vec<_>, _>>()?;
    let stages = items(required(root, "stages")?)
        .enumerate()
        .map(|(i, node)| parse_stage(node, &features).map_err(|e| context(e, format!("stage {i}"))))
        .collect::<Result<Vec<_>, _>>()?;

    let cascade = HaarCascade {
        window_width,
        window_height,
        stages,
        norm_inset: OPENCV_NORM_INSET,
    };
    cascade.validate()?;
    Ok(cascade)
}

fn parse_feature(node: Node) -> Result<HaarFeature, CascadeError> {
    if let Some(tilted) = child(node, "tilted").and_then(|n| n.text()) {
        if tilted.trim() != "0" {
            return Err(invalid("tilted features are not supported"));
        }
    }
    let rects = items(required(node, "rects")?)
        .map(|rect| {
            let tokens = tokens(rect);
            let [x, y, width, height, weight] = tokens.as_slice() else {
                return Err(invalid(format!(
                    "rect needs 5 values, got {}",
                    tokens.len()
                )));
            };
            Ok(WeightedRect {
                x: number(x)?,
                y: number(y)?,
                width: number(width)?,
                height: number(height)?,
                weight: number(weight)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if rects.is_empty() {
        return Err(invalid("feature has no rects"));
    }
    Ok(HaarFeature { rects })
}

fn parse_stage(node: Node, features: &[HaarFeature]) -> Result<Stage, CascadeError> {
    let threshold: f32 = single(required(node, "stageThreshold")?)?;
    let classifiers = items(required(node, "weakClassifiers")?)
        .map(|weak| parse_weak_classifier(weak, features))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Stage {
        threshold: threshold - STAGE_THRESHOLD_EPS,
        classifiers,
    })
}

/// A single split: `internalNodes` is `left right feature threshold` with
/// both children pointing at leaves (0 and -1).
fn parse_weak_classifier(node: Node, features: &[HaarFeature]) -> Result<WeakClassifier, CascadeError> {
    let nodes = tokens(required(node, "internalNodes")?);
    let leaves = tokens(required(node, "leafValues")?);
    let ([left, right, feature, threshold], [left_leaf, right_leaf]) =
        (nodes.as_slice(), leaves.as_slice())
    else {
        return Err(invalid(format!(
            "only single-split classifiers are supported ({} node values, {} leaves)",
            nodes.len(),
            leaves.len()
        )));
    };
    if number::<i64>(left)? != 0 || number::<i64>(right)? != -1 {
        return Err(invalid(format!("unexpected split children {left} {right}")));
    }
    let index: usize = number(feature)?;
    let Some(feature) = features.get(index) else {
        return Err(invalid(format!(
            "feature index {index} out of range ({} features)",
            features.len()
        )));
    };
    Ok(WeakClassifier {
        feature: feature.clone(),
        threshold: number(threshold)?,
        left: number(left_leaf)?,
        right: number(right_leaf)?,
    })
}

fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn required<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Result<Node<'a, 'i>, CascadeError> {
    child(node, name).ok_or_else(|| invalid(format!("missing <{name}>")))
}

/// The `<_>` entries of an OpenCV sequence node.
fn items<'a, 'i: 'a>(node: Node<'a, 'i>) -> impl Iterator<Item = Node<'a, 'i>> {
    node.children().filter(|n| n.has_tag_name("_"))
}

fn tokens<'a>(node: Node<'a, '_>) -> Vec<&'a str> {
    node.text().map(|t| t.split_whitespace().collect()).unwrap_or_default()
}

fn single<T: FromStr>(node: Node) -> Result<T, CascadeError> {
    match tokens(node).as_slice() {
        [value] => number(value),
        other => Err(invalid(format!(
            "<{}> needs one value, got {}",
            node.tag_name().name(),
            other.len()
        ))),
    }
}

fn number<T: FromStr>(token: &str) -> Result<T, CascadeError> {
    token
        .parse()
        .map_err(|_| invalid(format!("bad number {token:?}")))
}

fn invalid(message: impl Into<String>) -> CascadeError {
    CascadeError::Invalid(message.into())
}

fn context(error: CascadeError, location: String) -> CascadeError {
    match error {
        CascadeError::Invalid(message) => CascadeError::Invalid(format!("{location}: {message}")),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::haar_cascade::tests::bright_center_cascade;
    use crate::detection::domain::integral_image::IntegralImage;
    use approx::assert_relative_eq;

    /// The bright-centre cascade as OpenCV would write it.
    const BRIGHT_CENTER_XML: &str = r#"<?xml version="1.0"?>
<!-- trimmed to the fields a stump cascade needs -->
<opencv_storage>
<cascade type_id="opencv-cascade-classifier"><stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>20</height>
  <width>20</width>
  <stageParams>
    <maxWeakCount>1</maxWeakCount></stageParams>
  <featureParams>
    <maxCatCount>0</maxCatCount></featureParams>
  <stageNum>1</stageNum>
  <stages>
    <_>
      <maxWeakCount>1</maxWeakCount>
      <stageThreshold>5.0000000000000000e-01</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>
            0 -1 0 3.2000000000000001e-01</internalNodes>
          <leafValues>
            0. 1.</leafValues></_></weakClassifiers></_></stages>
  <features>
    <_>
      <rects>
        <_>
          5 5 10 10 1.</_>
        <_>
          0 0 20 20 -2.5000000000000000e-01</_></rects>
      <tilted>0</tilted></_></features></cascade>
</opencv_storage>
"#;

    fn square_image() -> (Vec<u8>, usize, usize) {
        let (w, h) = (100usize, 100usize);
        let mut gray = vec![0u8; w * h];
        for y in 45..55 {
            for x in 45..55 {
                gray[y * w + x] = 255;
            }
        }
        (gray, w, h)
    }

    #[test]
    fn test_opencv_xml_maps_onto_cascade() {
        let parsed = from_opencv_xml(BRIGHT_CENTER_XML).unwrap();
        let expected = bright_center_cascade();

        assert_eq!((parsed.window_width, parsed.window_height), (20, 20));
        assert_eq!(parsed.norm_inset, 1);
        assert_eq!(parsed.stages.len(), 1);
        assert_relative_eq!(parsed.stages[0].threshold, 0.5 - STAGE_THRESHOLD_EPS);
        assert_eq!(parsed.stages[0].classifiers, expected.stages[0].classifiers);
    }

    #[test]
    fn test_parsed_xml_cascade_finds_the_block() {
        let cascade = from_opencv_xml(BRIGHT_CENTER_XML).unwrap();
        let (gray, w, h) = square_image();
        let ii = IntegralImage::new(&gray, w, h);
        assert!(cascade.evaluate(&ii, 40, 40, 1.0));
        assert!(!cascade.evaluate(&ii, 0, 0, 1.0));
    }

    #[test]
    fn test_tilted_feature_is_rejected() {
        let text = BRIGHT_CENTER_XML.replace("<tilted>0</tilted>", "<tilted>1</tilted>");
        let err = from_opencv_xml(&text).unwrap_err();
        assert!(err.to_string().contains("tilted"), "{err}");
    }

    #[test]
    fn test_deeper_tree_is_rejected() {
        let text = BRIGHT_CENTER_XML
            .replace("0 -1 0 3.2000000000000001e-01", "1 -1 0 0.32 0 -2 0 0.5")
            .replace("0. 1.</leafValues>", "0. 1. 0.5</leafValues>");
        let err = from_opencv_xml(&text).unwrap_err();
        assert!(err.to_string().contains("stage 0"), "{err}");
        assert!(err.to_string().contains("single-split"), "{err}");
    }

    #[test]
    fn test_feature_index_out_of_range() {
        let text = BRIGHT_CENTER_XML.replace("0 -1 0 3.2", "0 -1 7 3.2");
        let err = from_opencv_xml(&text).unwrap_err();
        assert!(err.to_string().contains("feature index 7"), "{err}");
    }

    #[test]
    fn test_legacy_layout_is_rejected() {
        let text = r#"<opencv_storage><haarcascade_frontalface type_id="opencv-haar-classifier">
            <size>20 20</size><stages></stages></haarcascade_frontalface></opencv_storage>"#;
        let err = from_opencv_xml(text).unwrap_err();
        assert!(err.to_string().contains("<cascade>"), "{err}");
    }

    #[test]
    fn test_lbp_cascade_is_rejected() {
        let text = BRIGHT_CENTER_XML.replace("<featureType>HAAR", "<featureType>LBP");
        assert!(matches!(from_opencv_xml(&text), Err(CascadeError::Invalid(_))));
    }

    #[test]
    fn test_malformed_xml_is_xml_error() {
        assert!(matches!(
            from_opencv_xml("<cascade><width>20</cascade>"),
            Err(CascadeError::Xml(_))
        ));
    }

    #[test]
    fn test_load_picks_format_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let xml = dir.path().join("frontal.XML");
        std::fs::write(&xml, BRIGHT_CENTER_XML).unwrap();
        assert_eq!(load(&xml).unwrap().norm_inset, 1);

        let json = dir.path().join("frontal.json");
        std::fs::write(&json, serde_json::to_string(&bright_center_cascade()).unwrap()).unwrap();
        assert_eq!(load(&json).unwrap(), bright_center_cascade());

        assert!(matches!(
            load(&dir.path().join("missing.xml")),
            Err(CascadeError::Io(_))
        ));
    }
}
