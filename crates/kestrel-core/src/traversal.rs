// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Drives a [`Serializer`] over reflected values.
//!
//! The functions here issue the same call sequence whether the serializer is reading
//! or writing, so a reflected type is persisted and restored by a single traversal.
//! Scopes opened by the traversal are always closed again, even when a member fails,
//! which keeps the serializer usable for the rest of the session.

use crate::error::{SerializeError, SerializeResult};
use crate::flags::SerializationFlags;
use crate::reflect::{Reflect, ReflectArray, ReflectEnum, Reflected, ValueMut};
use crate::serializer::Serializer;

/// Serializes any reflected value.
pub fn serialize_value<'de, S>(
    serializer: &mut S,
    value: ValueMut<'_>,
    id: Option<&str>,
    flags: SerializationFlags,
) -> SerializeResult
where
    S: Serializer<'de> + ?Sized,
{
    match value {
        ValueMut::Bool(v) => serializer.serialize_bool(v, id),
        ValueMut::I8(v) => serializer.serialize_i8(v, id),
        ValueMut::I16(v) => serializer.serialize_i16(v, id),
        ValueMut::I32(v) => serializer.serialize_i32(v, id),
        ValueMut::I64(v) => serializer.serialize_i64(v, id),
        ValueMut::U8(v) => serializer.serialize_u8(v, id),
        ValueMut::U16(v) => serializer.serialize_u16(v, id),
        ValueMut::U32(v) => serializer.serialize_u32(v, id),
        ValueMut::U64(v) => serializer.serialize_u64(v, id),
        ValueMut::F32(v) => serializer.serialize_f32(v, id),
        ValueMut::F64(v) => serializer.serialize_f64(v, id),
        ValueMut::String(v) => serializer.serialize_string(v, id),
        ValueMut::Class(instance) => serialize_class_instance(serializer, instance, id, flags),
        ValueMut::Array(array) => serialize_array(serializer, array, id, flags),
        ValueMut::Enum(value) => serialize_enum(serializer, value, id, flags),
    }
}

/// Serializes a class instance as an object holding one field per reflected member.
pub fn serialize_class_instance<'de, S>(
    serializer: &mut S,
    instance: &mut dyn Reflect,
    id: Option<&str>,
    flags: SerializationFlags,
) -> SerializeResult
where
    S: Serializer<'de> + ?Sized,
{
    serializer.begin_serialize_object(id)?;
    let result = serialize_class_instance_members(serializer, instance, flags);
    let end = serializer.end_serialize_object();
    result.and(end)
}

/// Serializes the members of `instance` into the object scope the caller already opened.
///
/// This lets callers store extra fields next to the members, such as a type tag.
/// When reading with [`SerializationFlags::IGNORE_MISSING_KEYS`], members whose field
/// is absent from the source keep their current value.
pub fn serialize_class_instance_members<'de, S>(
    serializer: &mut S,
    instance: &mut dyn Reflect,
    flags: SerializationFlags,
) -> SerializeResult
where
    S: Serializer<'de> + ?Sized,
{
    let type_name = instance.type_name();
    let skip_missing = flags.contains(SerializationFlags::IGNORE_MISSING_KEYS);

    for (index, member) in instance.members().iter().enumerate() {
        let Some(value) = instance.member_mut(index) else {
            continue;
        };

        match serialize_value(serializer, value, Some(member.name), flags) {
            Ok(()) => {}
            Err(err) if skip_missing && serializer.is_reading() && err.is_missing_field() => {
                log::warn!("Skipping member '{}' of {type_name}: {err}", member.name);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

/// Serializes any value whose type is known statically.
pub fn serialize_reflected<'de, S, T>(
    serializer: &mut S,
    value: &mut T,
    id: Option<&str>,
    flags: SerializationFlags,
) -> SerializeResult
where
    S: Serializer<'de> + ?Sized,
    T: Reflected,
{
    serialize_value(serializer, value.as_value_mut(), id, flags)
}

fn serialize_array<'de, S>(
    serializer: &mut S,
    array: &mut dyn ReflectArray,
    id: Option<&str>,
    flags: SerializationFlags,
) -> SerializeResult
where
    S: Serializer<'de> + ?Sized,
{
    let mut size = if serializer.is_writing() {
        u32::try_from(array.len()).map_err(|_| SerializeError::ArrayOutOfBounds {
            index: array.len(),
            len: u32::MAX as usize,
        })?
    } else {
        0
    };

    serializer.begin_serialize_array(&mut size, id)?;
    let result = serialize_elements(serializer, array, size as usize, flags);
    let end = serializer.end_serialize_array();
    result.and(end)
}

fn serialize_elements<'de, S>(
    serializer: &mut S,
    array: &mut dyn ReflectArray,
    len: usize,
    flags: SerializationFlags,
) -> SerializeResult
where
    S: Serializer<'de> + ?Sized,
{
    let reading = serializer.is_reading();
    if reading {
        let fits = if array.is_fixed_size() {
            array.resize(len)
        } else {
            len >= array.len() || array.resize(len)
        };
        if !fits {
            return Err(SerializeError::FixedArrayLength {
                expected: array.len(),
                found: len,
            });
        }
    }

    for index in 0..len {
        // Growable arrays gain one element at a time, so a bogus count fails on the
        // first missing element instead of allocating for all of them.
        if reading && index == array.len() && !array.resize(index + 1) {
            return Err(SerializeError::FixedArrayLength {
                expected: array.len(),
                found: len,
            });
        }
        if let Some(element) = array.element_mut(index) {
            serialize_value(serializer, element, None, flags)?;
        }
    }
    Ok(())
}

fn serialize_enum<'de, S>(
    serializer: &mut S,
    value: &mut dyn ReflectEnum,
    id: Option<&str>,
    flags: SerializationFlags,
) -> SerializeResult
where
    S: Serializer<'de> + ?Sized,
{
    if flags.contains(SerializationFlags::ENUM_BY_NAME) {
        let mut name = value.variant_name().to_string();
        serializer.serialize_string(&mut name, id)?;
        if serializer.is_reading() && !value.set_variant_by_name(&name) {
            return unknown_enum_value(value, name, flags);
        }
    } else {
        let mut discriminant = value.discriminant();
        serializer.serialize_i64(&mut discriminant, id)?;
        if serializer.is_reading() && !value.set_discriminant(discriminant) {
            return unknown_enum_value(value, discriminant.to_string(), flags);
        }
    }
    Ok(())
}

fn unknown_enum_value(
    value: &dyn ReflectEnum,
    stored: String,
    flags: SerializationFlags,
) -> SerializeResult {
    if flags.contains(SerializationFlags::ENUM_IGNORE_UNKNOWN_VALUES) {
        log::warn!(
            "Unknown value `{stored}` for enum {}, keeping {}.",
            value.enum_name(),
            value.variant_name()
        );
        return Ok(());
    }
    Err(SerializeError::UnknownEnumValue {
        enum_name: value.enum_name(),
        value: stored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::DEFAULT_SERIALIZATION_FLAGS;
    use crate::serializer::{SerializationMode, SessionState};
    use crate::reflect::{ScalarKind, TypeKind};
    use crate::Reflect;
    use std::collections::HashMap;
    use std::fmt::Display;
    use std::str::FromStr;

    /// Flat test serializer: writes log every call, reads look values up by id.
    #[derive(Default)]
    struct Recorder {
        state: SessionState,
        calls: Vec<String>,
        source: HashMap<String, String>,
        stored_array_len: u32,
    }

    impl Recorder {
        fn reading(source: &[(&str, &str)]) -> Self {
            let mut recorder = Self {
                source: source
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                ..Default::default()
            };
            recorder.state.begin(SerializationMode::Read);
            recorder
        }

        fn writing() -> Self {
            let mut recorder = Self::default();
            recorder.state.begin(SerializationMode::Write);
            recorder
        }

        fn finish(mut self) -> Vec<String> {
            let mode = self.state.mode();
            self.state.end(mode);
            std::mem::take(&mut self.calls)
        }

        fn scalar<T: Display + FromStr>(&mut self, value: &mut T, id: Option<&str>) -> SerializeResult {
            let key = id.unwrap_or("_");
            if self.state.mode() == SerializationMode::Write {
                self.calls.push(format!("{key}={value}"));
                return Ok(());
            }
            match self.source.get(key).map(|text| text.parse::<T>()) {
                Some(Ok(parsed)) => {
                    *value = parsed;
                    Ok(())
                }
                Some(Err(_)) => self.state.fail(SerializeError::TypeMismatch { expected: "scalar" }),
                None => self.state.fail(SerializeError::FieldNotFound(key.to_string())),
            }
        }
    }

    macro_rules! recorder_scalars {
        ($($method:ident: $ty:ty),*) => {
            $(
                fn $method(&mut self, value: &mut $ty, id: Option<&str>) -> SerializeResult {
                    self.scalar(value, id)
                }
            )*
        };
    }

    impl<'de> Serializer<'de> for Recorder {
        fn mode(&self) -> SerializationMode {
            self.state.mode()
        }

        fn last_error(&self) -> &str {
            self.state.last_error()
        }

        fn begin_write(&mut self) {}

        fn end_write(&mut self) -> Vec<u8> {
            Vec::new()
        }

        fn begin_read(&mut self, _data: &'de [u8]) -> SerializeResult {
            Ok(())
        }

        fn end_read(&mut self) {}

        recorder_scalars!(
            serialize_bool: bool,
            serialize_i8: i8,
            serialize_i16: i16,
            serialize_i32: i32,
            serialize_i64: i64,
            serialize_u8: u8,
            serialize_u16: u16,
            serialize_u32: u32,
            serialize_u64: u64,
            serialize_f32: f32,
            serialize_f64: f64,
            serialize_string: String
        );

        fn begin_serialize_array(&mut self, size: &mut u32, id: Option<&str>) -> SerializeResult {
            if self.state.mode() == SerializationMode::Read {
                *size = self.stored_array_len;
            }
            self.calls.push(format!("[{} {size}", id.unwrap_or("_")));
            Ok(())
        }

        fn end_serialize_array(&mut self) -> SerializeResult {
            self.calls.push("]".to_string());
            Ok(())
        }

        fn begin_serialize_object(&mut self, id: Option<&str>) -> SerializeResult {
            self.calls.push(format!("{{{}", id.unwrap_or("_")));
            Ok(())
        }

        fn end_serialize_object(&mut self) -> SerializeResult {
            self.calls.push("}".to_string());
            Ok(())
        }
    }

    #[derive(Reflect, Debug, Clone, Copy, PartialEq, Default)]
    enum Filter {
        #[default]
        Nearest,
        Linear = 4,
    }

    #[derive(Reflect, Debug, Default, PartialEq)]
    struct Sampler {
        filter: Filter,
        #[reflect(rename = "anisotropy")]
        max_anisotropy: u8,
        #[reflect(skip)]
        cached: u32,
    }

    #[derive(Reflect, Debug, Default, PartialEq)]
    struct Material {
        name: String,
        sampler: Sampler,
        weights: Vec<f32>,
    }

    #[derive(Reflect, Debug, Default, PartialEq)]
    #[reflect(transparent)]
    struct TextureId {
        raw: u32,
    }

    #[derive(Reflect, Debug, Default, PartialEq)]
    #[reflect(array)]
    struct Extent {
        width: u16,
        height: u16,
        #[reflect(skip)]
        area: u32,
    }

    #[derive(Reflect, Debug, Default, PartialEq)]
    struct Texture {
        id: TextureId,
        extent: Extent,
    }

    #[test]
    fn write_visits_members_in_declaration_order() {
        let mut material = Material {
            name: "stone".to_string(),
            sampler: Sampler {
                filter: Filter::Linear,
                max_anisotropy: 8,
                cached: 77,
            },
            weights: vec![0.5, 1.5],
        };

        let mut recorder = Recorder::writing();
        serialize_reflected(&mut recorder, &mut material, None, DEFAULT_SERIALIZATION_FLAGS)
            .expect("Write should succeed");

        assert_eq!(
            recorder.finish(),
            vec![
                "{_", "name=stone", "{sampler", "filter=4", "anisotropy=8", "}", "[weights 2",
                "_=0.5", "_=1.5", "]", "}",
            ]
        );
    }

    #[test]
    fn enum_by_name_writes_variant_name() {
        let mut sampler = Sampler {
            filter: Filter::Linear,
            ..Default::default()
        };

        let mut recorder = Recorder::writing();
        let flags = DEFAULT_SERIALIZATION_FLAGS | SerializationFlags::ENUM_BY_NAME;
        serialize_reflected(&mut recorder, &mut sampler, None, flags).expect("Write should succeed");

        assert!(recorder.finish().contains(&"filter=Linear".to_string()));
    }

    #[test]
    fn missing_members_are_skipped_by_default() {
        let mut sampler = Sampler {
            max_anisotropy: 3,
            ..Default::default()
        };

        let mut recorder = Recorder::reading(&[("filter", "4")]);
        serialize_reflected(&mut recorder, &mut sampler, None, DEFAULT_SERIALIZATION_FLAGS)
            .expect("Missing members should be skipped");
        recorder.finish();

        assert_eq!(sampler.filter, Filter::Linear);
        assert_eq!(sampler.max_anisotropy, 3);
    }

    #[test]
    fn missing_members_fail_without_flag() {
        let mut sampler = Sampler::default();

        let mut recorder = Recorder::reading(&[("filter", "4")]);
        let err = serialize_reflected(&mut recorder, &mut sampler, None, SerializationFlags::EMPTY)
            .unwrap_err();
        let calls = recorder.finish();

        assert_eq!(err, SerializeError::FieldNotFound("anisotropy".into()));
        // The object scope is closed even though a member failed.
        assert_eq!(calls.last().map(String::as_str), Some("}"));
    }

    #[test]
    fn unknown_enum_value_fails_or_keeps_current() {
        let mut filter = Filter::Linear;

        let mut recorder = Recorder::reading(&[("f", "99")]);
        let err = serialize_reflected(&mut recorder, &mut filter, Some("f"), SerializationFlags::EMPTY)
            .unwrap_err();
        assert!(matches!(err, SerializeError::UnknownEnumValue { enum_name: "Filter", .. }));

        serialize_reflected(
            &mut recorder,
            &mut filter,
            Some("f"),
            SerializationFlags::ENUM_IGNORE_UNKNOWN_VALUES,
        )
        .expect("Unknown values should be ignored");
        recorder.finish();
        assert_eq!(filter, Filter::Linear);
    }

    #[test]
    fn read_resizes_vectors_and_checks_fixed_arrays() {
        let mut weights: Vec<u16> = vec![1];
        let mut recorder = Recorder::reading(&[("_", "7")]);
        recorder.stored_array_len = 3;
        serialize_reflected(&mut recorder, &mut weights, None, SerializationFlags::EMPTY)
            .expect("Read should succeed");
        assert_eq!(weights, vec![7, 7, 7]);

        let mut fixed = [0u16; 2];
        let err = serialize_reflected(&mut recorder, &mut fixed, None, SerializationFlags::EMPTY)
            .unwrap_err();
        let calls = recorder.finish();

        assert_eq!(err, SerializeError::FixedArrayLength { expected: 2, found: 3 });
        assert_eq!(calls.last().map(String::as_str), Some("]"));
    }

    #[test]
    fn read_grows_vectors_one_element_at_a_time() {
        let mut weights: Vec<u16> = Vec::new();
        let mut recorder = Recorder::reading(&[]);
        recorder.stored_array_len = u32::MAX;
        let err = serialize_reflected(&mut recorder, &mut weights, None, SerializationFlags::EMPTY)
            .unwrap_err();
        assert_eq!(err, SerializeError::FieldNotFound("_".into()));
        assert_eq!(weights.len(), 1);

        let mut longer: Vec<u16> = vec![1, 2, 3, 4];
        recorder.source.insert("_".into(), "7".into());
        recorder.stored_array_len = 2;
        serialize_reflected(&mut recorder, &mut longer, None, SerializationFlags::EMPTY)
            .expect("Read should succeed");
        recorder.finish();
        assert_eq!(longer, vec![7, 7]);
    }

    #[test]
    fn derived_reflection_describes_members() {
        let mut sampler = Sampler::default();
        let names: Vec<_> = sampler.members().iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["filter", "anisotropy"]);
        assert_eq!(sampler.find_member("anisotropy"), Some(1));
        assert!(sampler.member_mut(2).is_none());
        assert_eq!(sampler.type_name(), "Sampler");
    }

    #[test]
    fn container_attributes_change_the_stored_shape() {
        let mut texture = Texture {
            id: TextureId { raw: 7 },
            extent: Extent {
                width: 64,
                height: 32,
                area: 2048,
            },
        };
        assert_eq!(
            texture.members().iter().map(|m| m.kind).collect::<Vec<_>>(),
            vec![TypeKind::Scalar(ScalarKind::U32), TypeKind::Array]
        );

        let mut recorder = Recorder::writing();
        serialize_reflected(&mut recorder, &mut texture, None, DEFAULT_SERIALIZATION_FLAGS)
            .expect("Write should succeed");
        assert_eq!(
            recorder.finish(),
            vec!["{_", "id=7", "[extent 2", "_=64", "_=32", "]", "}"]
        );

        let mut extent = Extent::default();
        let mut recorder = Recorder::reading(&[("_", "9")]);
        recorder.stored_array_len = 3;
        let err = serialize_reflected(&mut recorder, &mut extent, None, SerializationFlags::EMPTY)
            .unwrap_err();
        assert_eq!(err, SerializeError::FixedArrayLength { expected: 2, found: 3 });

        recorder.stored_array_len = 2;
        serialize_reflected(&mut recorder, &mut extent, None, SerializationFlags::EMPTY)
            .expect("Read should succeed");
        recorder.finish();
        assert_eq!((extent.width, extent.height, extent.area), (9, 9, 0));
    }
}
