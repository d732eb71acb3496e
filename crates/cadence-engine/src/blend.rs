//! Property blend registry.
//!
//! A process-wide table mapping each animatable property to its equality
//! predicate and blend function over style snapshots. The table is built
//! lazily on first use and lives for the rest of the process. That is an
//! intentional long-lived cache matching the lifetime of the style system,
//! not a leak. Single-threaded access only; initialization through
//! `OnceLock` keeps the lazy build safe regardless.

use std::collections::HashMap;
use std::sync::OnceLock;

use cadence_style::{
    AnimatableProperty, BoxShadow, Length, StyleSnapshot, TransformList, TransitionTarget,
    Visibility,
};

type EqualsFn = fn(&StyleSnapshot, &StyleSnapshot) -> bool;
type BlendFn = fn(&mut StyleSnapshot, &StyleSnapshot, &StyleSnapshot, f64);

struct PropertyWrapper {
    property: AnimatableProperty,
    equals: EqualsFn,
    blend: BlendFn,
}

struct PropertyTable {
    wrappers: Vec<PropertyWrapper>,
    index: HashMap<AnimatableProperty, usize>,
}

static PROPERTY_TABLE: OnceLock<PropertyTable> = OnceLock::new();

fn table() -> &'static PropertyTable {
    PROPERTY_TABLE.get_or_init(build_table)
}

fn lerp_f64(from: f64, to: f64, progress: f64) -> f64 {
    from + (to - from) * progress
}

fn lerp_f32(from: f32, to: f32, progress: f64) -> f32 {
    (from as f64 + (to as f64 - from as f64) * progress) as f32
}

fn blend_i32(from: i32, to: i32, progress: f64) -> i32 {
    (from as f64 + (to as f64 - from as f64) * progress) as i32
}

/// Visibility blends as a step function: treating one value as 1.0 and the
/// other as 0.0, any nonzero blended value resolves visible; a zero blend
/// resolves to whichever input was the invisible variant, preferring the
/// target side.
fn blend_visibility(from: Visibility, to: Visibility, progress: f64) -> Visibility {
    let from_val = if from == Visibility::Visible { 1.0 } else { 0.0 };
    let to_val = if to == Visibility::Visible { 1.0 } else { 0.0 };
    if from_val == to_val {
        return to;
    }
    let result = lerp_f64(from_val, to_val, progress);
    if result > 0.0 {
        Visibility::Visible
    } else if to != Visibility::Visible {
        to
    } else {
        from
    }
}

fn blend_shadow(
    from: Option<BoxShadow>,
    to: Option<BoxShadow>,
    progress: f64,
) -> Option<BoxShadow> {
    if from.is_none() && to.is_none() {
        return None;
    }
    let from = from.unwrap_or_else(BoxShadow::none);
    let to = to.unwrap_or_else(BoxShadow::none);
    Some(from.blend(&to, progress))
}

fn build_table() -> PropertyTable {
    use AnimatableProperty as P;

    let mut wrappers: Vec<PropertyWrapper> = Vec::new();
    let mut push = |property: P, equals: EqualsFn, blend: BlendFn| {
        wrappers.push(PropertyWrapper {
            property,
            equals,
            blend,
        });
    };

    // Geometry
    push(
        P::Left,
        |a, b| a.left == b.left,
        |dst, a, b, p| dst.left = Length::blend(a.left, b.left, p),
    );
    push(
        P::Top,
        |a, b| a.top == b.top,
        |dst, a, b, p| dst.top = Length::blend(a.top, b.top, p),
    );
    push(
        P::Width,
        |a, b| a.width == b.width,
        |dst, a, b, p| dst.width = Length::blend(a.width, b.width, p),
    );
    push(
        P::Height,
        |a, b| a.height == b.height,
        |dst, a, b, p| dst.height = Length::blend(a.height, b.height, p),
    );

    // Spacing
    push(
        P::MarginLeft,
        |a, b| a.margin_left == b.margin_left,
        |dst, a, b, p| dst.margin_left = Length::blend(a.margin_left, b.margin_left, p),
    );
    push(
        P::MarginRight,
        |a, b| a.margin_right == b.margin_right,
        |dst, a, b, p| dst.margin_right = Length::blend(a.margin_right, b.margin_right, p),
    );
    push(
        P::MarginTop,
        |a, b| a.margin_top == b.margin_top,
        |dst, a, b, p| dst.margin_top = Length::blend(a.margin_top, b.margin_top, p),
    );
    push(
        P::MarginBottom,
        |a, b| a.margin_bottom == b.margin_bottom,
        |dst, a, b, p| dst.margin_bottom = Length::blend(a.margin_bottom, b.margin_bottom, p),
    );

    // Visual
    push(
        P::Opacity,
        |a, b| a.opacity == b.opacity,
        |dst, a, b, p| dst.opacity = lerp_f32(a.opacity, b.opacity, p),
    );
    push(
        P::Visibility,
        |a, b| a.visibility == b.visibility,
        |dst, a, b, p| dst.visibility = blend_visibility(a.visibility, b.visibility, p),
    );
    push(
        P::ZIndex,
        |a, b| a.z_index == b.z_index,
        |dst, a, b, p| {
            use cadence_style::ZIndex;
            dst.z_index = match (a.z_index, b.z_index) {
                (ZIndex::Index { value: from }, ZIndex::Index { value: to }) => ZIndex::Index {
                    value: blend_i32(from, to, p),
                },
                // Auto does not interpolate.
                (_, to) => to,
            };
        },
    );
    push(
        P::Transform,
        |a, b| a.transform == b.transform,
        |dst, a, b, p| dst.transform = TransformList::blend(&a.transform, &b.transform, p),
    );
    push(
        P::BoxShadow,
        |a, b| a.box_shadow == b.box_shadow,
        |dst, a, b, p| dst.box_shadow = blend_shadow(a.box_shadow, b.box_shadow, p),
    );

    // Color
    push(
        P::Color,
        |a, b| a.color == b.color,
        |dst, a, b, p| dst.color = a.color.blend(&b.color, p),
    );
    push(
        P::BackgroundColor,
        |a, b| a.background_color == b.background_color,
        |dst, a, b, p| dst.background_color = a.background_color.blend(&b.background_color, p),
    );
    // Maybe-unset colors resolve through the base color fallback on both
    // sides before comparing or blending.
    push(
        P::BorderColor,
        |a, b| a.resolved_border_color() == b.resolved_border_color(),
        |dst, a, b, p| {
            dst.border_color = Some(
                a.resolved_border_color()
                    .blend(&b.resolved_border_color(), p),
            );
        },
    );
    push(
        P::OutlineColor,
        |a, b| a.resolved_outline_color() == b.resolved_outline_color(),
        |dst, a, b, p| {
            dst.outline_color = Some(
                a.resolved_outline_color()
                    .blend(&b.resolved_outline_color(), p),
            );
        },
    );

    // Text
    push(
        P::FontSize,
        |a, b| a.font_size == b.font_size,
        |dst, a, b, p| dst.font_size = lerp_f64(a.font_size, b.font_size, p),
    );
    push(
        P::LetterSpacing,
        |a, b| a.letter_spacing == b.letter_spacing,
        |dst, a, b, p| dst.letter_spacing = lerp_f64(a.letter_spacing, b.letter_spacing, p),
    );

    let index = wrappers
        .iter()
        .enumerate()
        .map(|(i, w)| (w.property, i))
        .collect();
    PropertyTable { wrappers, index }
}

/// Number of registered properties.
pub fn property_count() -> usize {
    table().wrappers.len()
}

/// Property at a registry position, used to expand `all` transitions.
pub fn property_at(index: usize) -> Option<AnimatableProperty> {
    table().wrappers.get(index).map(|w| w.property)
}

/// Iterate every registered property in registry order.
pub fn registered_properties() -> impl Iterator<Item = AnimatableProperty> {
    let t = table();
    (0..t.wrappers.len()).map(move |i| t.wrappers[i].property)
}

/// Compare one property between two snapshots. Unregistered properties
/// compare equal (nothing to animate).
pub fn property_equal(prop: AnimatableProperty, a: &StyleSnapshot, b: &StyleSnapshot) -> bool {
    let t = table();
    match t.index.get(&prop) {
        Some(&i) => (t.wrappers[i].equals)(a, b),
        None => true,
    }
}

/// Compare a transition target between two snapshots; `All` scans every
/// registered property.
pub fn properties_equal(target: TransitionTarget, a: &StyleSnapshot, b: &StyleSnapshot) -> bool {
    match target {
        TransitionTarget::All => table().wrappers.iter().all(|w| (w.equals)(a, b)),
        TransitionTarget::Property { property } => property_equal(property, a, b),
    }
}

/// Blend one property of `a` and `b` into `dst` at `progress`. Returns true
/// when the property was registered and blended, i.e. the animation needs
/// the timer to keep firing.
pub fn blend_property(
    prop: AnimatableProperty,
    dst: &mut StyleSnapshot,
    a: &StyleSnapshot,
    b: &StyleSnapshot,
    progress: f64,
) -> bool {
    let t = table();
    match t.index.get(&prop) {
        Some(&i) => {
            (t.wrappers[i].blend)(dst, a, b, progress);
            true
        }
        None => false,
    }
}

/// Blend every registered property that differs between `a` and `b`.
///
/// Per-property blending is the only path the engine exercises; whole-style
/// blending is unverified and kept behind a debug contract check. In release
/// it degrades to the full scan.
pub fn blend_all(dst: &mut StyleSnapshot, a: &StyleSnapshot, b: &StyleSnapshot, progress: f64) -> bool {
    debug_assert!(false, "whole-style blending is unverified");
    let mut needs_timer = false;
    for w in &table().wrappers {
        if !(w.equals)(a, b) {
            (w.blend)(dst, a, b, progress);
            needs_timer = true;
        }
    }
    needs_timer
}
