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

//! The reflection boundary consumed by the traversal layer.
//!
//! Reflection answers two questions about a class: which members it has, in order,
//! and, given an instance, how to reach member N. The second answer is a [`ValueMut`],
//! a closed sum of mutable views (one arm per scalar kind, plus classes, arrays and
//! enums), so the traversal never touches raw offsets.
//!
//! Implementations are normally generated with `#[derive(Reflect)]`.

/// The scalar kinds every serializer supports natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// `bool`
    Bool,
    /// `i8`
    I8,
    /// `i16`
    I16,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `u8`
    U8,
    /// `u16`
    U16,
    /// `u32`
    U32,
    /// `u64`
    U64,
    /// `f32`
    F32,
    /// `f64`
    F64,
    /// `String`
    String,
}

impl ScalarKind {
    /// Returns the Rust name of the scalar type.
    pub const fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::I8 => "i8",
            ScalarKind::I16 => "i16",
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
            ScalarKind::U8 => "u8",
            ScalarKind::U16 => "u16",
            ScalarKind::U32 => "u32",
            ScalarKind::U64 => "u64",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
            ScalarKind::String => "String",
        }
    }
}

/// The kind of a reflected type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// One of the natively supported scalars.
    Scalar(ScalarKind),
    /// A class with named members.
    Class,
    /// A positional sequence of elements.
    Array,
    /// A field-less enum.
    Enum,
}

/// Describes one reflected member of a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberDesc {
    /// The field id the member is serialized under.
    pub name: &'static str,
    /// The kind of the member's type.
    pub kind: TypeKind,
}

/// A mutable view on a reflected value.
pub enum ValueMut<'a> {
    /// A `bool` value.
    Bool(&'a mut bool),
    /// An `i8` value.
    I8(&'a mut i8),
    /// An `i16` value.
    I16(&'a mut i16),
    /// An `i32` value.
    I32(&'a mut i32),
    /// An `i64` value.
    I64(&'a mut i64),
    /// A `u8` value.
    U8(&'a mut u8),
    /// A `u16` value.
    U16(&'a mut u16),
    /// A `u32` value.
    U32(&'a mut u32),
    /// A `u64` value.
    U64(&'a mut u64),
    /// An `f32` value.
    F32(&'a mut f32),
    /// An `f64` value.
    F64(&'a mut f64),
    /// A `String` value.
    String(&'a mut String),
    /// A class instance.
    Class(&'a mut dyn Reflect),
    /// An array.
    Array(&'a mut dyn ReflectArray),
    /// An enum value.
    Enum(&'a mut dyn ReflectEnum),
}

impl ValueMut<'_> {
    /// Returns the kind of the viewed value.
    pub fn kind(&self) -> TypeKind {
        match self {
            ValueMut::Bool(_) => TypeKind::Scalar(ScalarKind::Bool),
            ValueMut::I8(_) => TypeKind::Scalar(ScalarKind::I8),
            ValueMut::I16(_) => TypeKind::Scalar(ScalarKind::I16),
            ValueMut::I32(_) => TypeKind::Scalar(ScalarKind::I32),
            ValueMut::I64(_) => TypeKind::Scalar(ScalarKind::I64),
            ValueMut::U8(_) => TypeKind::Scalar(ScalarKind::U8),
            ValueMut::U16(_) => TypeKind::Scalar(ScalarKind::U16),
            ValueMut::U32(_) => TypeKind::Scalar(ScalarKind::U32),
            ValueMut::U64(_) => TypeKind::Scalar(ScalarKind::U64),
            ValueMut::F32(_) => TypeKind::Scalar(ScalarKind::F32),
            ValueMut::F64(_) => TypeKind::Scalar(ScalarKind::F64),
            ValueMut::String(_) => TypeKind::Scalar(ScalarKind::String),
            ValueMut::Class(_) => TypeKind::Class,
            ValueMut::Array(_) => TypeKind::Array,
            ValueMut::Enum(_) => TypeKind::Enum,
        }
    }
}

/// A class whose members can be enumerated and reached by index.
pub trait Reflect {
    /// Returns the name of the class.
    fn type_name(&self) -> &'static str;

    /// Returns the reflected members in declaration order.
    fn members(&self) -> &'static [MemberDesc];

    /// Returns a view on member `index` of this instance.
    fn member_mut(&mut self, index: usize) -> Option<ValueMut<'_>>;

    /// Returns the index of the member serialized under `name`.
    fn find_member(&self, name: &str) -> Option<usize> {
        self.members().iter().position(|member| member.name == name)
    }
}

/// A positional container of reflected elements.
pub trait ReflectArray {
    /// Returns the number of elements.
    fn len(&self) -> usize;

    /// Returns `true` if the array holds no element.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the length of the array cannot change.
    fn is_fixed_size(&self) -> bool;

    /// Resizes the array to `len` elements. Returns `false` if the array cannot hold `len`.
    fn resize(&mut self, len: usize) -> bool;

    /// Returns a view on element `index`.
    fn element_mut(&mut self, index: usize) -> Option<ValueMut<'_>>;
}

/// A field-less enum that can be converted to and from its name or discriminant.
pub trait ReflectEnum {
    /// Returns the name of the enum type.
    fn enum_name(&self) -> &'static str;

    /// Returns every variant name in declaration order.
    fn variant_names(&self) -> &'static [&'static str];

    /// Returns the name of the current variant.
    fn variant_name(&self) -> &'static str;

    /// Returns the discriminant of the current variant.
    fn discriminant(&self) -> i64;

    /// Switches to the variant called `name`. Returns `false` if there is none.
    fn set_variant_by_name(&mut self, name: &str) -> bool;

    /// Switches to the variant with discriminant `value`. Returns `false` if there is none.
    fn set_discriminant(&mut self, value: i64) -> bool;
}

/// A type the traversal knows how to reach.
pub trait Reflected {
    /// The kind of the type.
    const KIND: TypeKind;

    /// Returns a mutable view on `self`.
    fn as_value_mut(&mut self) -> ValueMut<'_>;
}

macro_rules! impl_reflected_scalar {
    ($($ty:ty => $variant:ident;)*) => {
        $(
            impl Reflected for $ty {
                const KIND: TypeKind = TypeKind::Scalar(ScalarKind::$variant);

                fn as_value_mut(&mut self) -> ValueMut<'_> {
                    ValueMut::$variant(self)
                }
            }
        )*
    };
}

impl_reflected_scalar! {
    bool => Bool;
    i8 => I8;
    i16 => I16;
    i32 => I32;
    i64 => I64;
    u8 => U8;
    u16 => U16;
    u32 => U32;
    u64 => U64;
    f32 => F32;
    f64 => F64;
    String => String;
}

impl<T: Reflected + Default> ReflectArray for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn is_fixed_size(&self) -> bool {
        false
    }

    fn resize(&mut self, len: usize) -> bool {
        self.resize_with(len, T::default);
        true
    }

    fn element_mut(&mut self, index: usize) -> Option<ValueMut<'_>> {
        self.get_mut(index).map(Reflected::as_value_mut)
    }
}

impl<T: Reflected + Default> Reflected for Vec<T> {
    const KIND: TypeKind = TypeKind::Array;

    fn as_value_mut(&mut self) -> ValueMut<'_> {
        ValueMut::Array(self)
    }
}

impl<T: Reflected, const N: usize> ReflectArray for [T; N] {
    fn len(&self) -> usize {
        N
    }

    fn is_fixed_size(&self) -> bool {
        true
    }

    fn resize(&mut self, len: usize) -> bool {
        len == N
    }

    fn element_mut(&mut self, index: usize) -> Option<ValueMut<'_>> {
        self.get_mut(index).map(Reflected::as_value_mut)
    }
}

impl<T: Reflected, const N: usize> Reflected for [T; N] {
    const KIND: TypeKind = TypeKind::Array;

    fn as_value_mut(&mut self) -> ValueMut<'_> {
        ValueMut::Array(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_views_report_their_kind() {
        let mut value = 7u16;
        assert_eq!(
            value.as_value_mut().kind(),
            TypeKind::Scalar(ScalarKind::U16)
        );
        assert_eq!(<String as Reflected>::KIND, TypeKind::Scalar(ScalarKind::String));
        assert_eq!(ScalarKind::F64.name(), "f64");
    }

    #[test]
    fn vec_resizes_with_defaults() {
        let mut values: Vec<u8> = vec![1, 2];
        assert!(ReflectArray::resize(&mut values, 4));
        assert_eq!(values, vec![1, 2, 0, 0]);

        match values.element_mut(1) {
            Some(ValueMut::U8(element)) => *element = 9,
            _ => panic!("Element 1 should be a u8 view"),
        }
        assert_eq!(values[1], 9);
        assert!(values.element_mut(4).is_none());
    }

    #[test]
    fn fixed_array_refuses_other_lengths() {
        let mut values = [0.5f32; 3];
        assert!(values.is_fixed_size());
        assert!(ReflectArray::resize(&mut values, 3));
        assert!(!ReflectArray::resize(&mut values, 2));
        assert_eq!(ReflectArray::len(&values), 3);
    }
}
