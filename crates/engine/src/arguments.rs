//! Typed argument lists
//!
//! Arguments are built once by the caller as an ordered list of
//! [`ScriptValue`]s and consumed by the dispatcher, which pushes each one
//! into the call frame with its own type.

use scripthook_sdk::ScriptValue;

/// Ordered argument list for a script call
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: Vec<ScriptValue>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an argument
    pub fn push(&mut self, value: impl Into<ScriptValue>) -> &mut Self {
        self.values.push(value.into());
        self
    }

    /// Builder-style append
    pub fn arg(mut self, value: impl Into<ScriptValue>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ScriptValue> {
        self.values.get(index)
    }

    pub fn as_slice(&self) -> &[ScriptValue] {
        &self.values
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScriptValue> {
        self.values.iter()
    }
}

impl From<Vec<ScriptValue>> for Arguments {
    fn from(values: Vec<ScriptValue>) -> Self {
        Self { values }
    }
}

impl FromIterator<ScriptValue> for Arguments {
    fn from_iter<I: IntoIterator<Item = ScriptValue>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Arguments {
    type Item = &'a ScriptValue;
    type IntoIter = std::slice::Iter<'a, ScriptValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

/// Anything that can be turned into an argument list
///
/// Implemented for prebuilt [`Arguments`], slices and vectors of values,
/// and tuples of up to eight values convertible to [`ScriptValue`].
pub trait IntoArguments {
    fn into_arguments(self) -> Arguments;
}

impl IntoArguments for Arguments {
    fn into_arguments(self) -> Arguments {
        self
    }
}

impl IntoArguments for &Arguments {
    fn into_arguments(self) -> Arguments {
        self.clone()
    }
}

impl IntoArguments for Vec<ScriptValue> {
    fn into_arguments(self) -> Arguments {
        Arguments::from(self)
    }
}

impl IntoArguments for &[ScriptValue] {
    fn into_arguments(self) -> Arguments {
        Arguments::from(self.to_vec())
    }
}

impl<const N: usize> IntoArguments for [ScriptValue; N] {
    fn into_arguments(self) -> Arguments {
        Arguments::from(Vec::from(self))
    }
}

impl IntoArguments for () {
    fn into_arguments(self) -> Arguments {
        Arguments::new()
    }
}

macro_rules! impl_into_arguments_tuple {
    ($($name:ident),+) => {
        impl<$($name: Into<ScriptValue>),+> IntoArguments for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_arguments(self) -> Arguments {
                let ($($name,)+) = self;
                Arguments::from(vec![$($name.into()),+])
            }
        }
    };
}

impl_into_arguments_tuple!(A);
impl_into_arguments_tuple!(A, B);
impl_into_arguments_tuple!(A, B, C);
impl_into_arguments_tuple!(A, B, C, D);
impl_into_arguments_tuple!(A, B, C, D, E);
impl_into_arguments_tuple!(A, B, C, D, E, F);
impl_into_arguments_tuple!(A, B, C, D, E, F, G);
impl_into_arguments_tuple!(A, B, C, D, E, F, G, H);

/// Build an [`Arguments`] list from positional values
///
/// ```ignore
/// let args = args![player_index, "spawned", 1.5f32];
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::Arguments::new()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::Arguments::from(vec![$($crate::ScriptValue::from($value)),+])
    };
}

/// Conversion from a returned [`ScriptValue`]
pub trait FromScriptValue: Sized {
    /// Name used in conversion errors
    const KIND: &'static str;

    fn from_script_value(value: ScriptValue) -> Option<Self>;
}

impl FromScriptValue for ScriptValue {
    const KIND: &'static str = "any";

    fn from_script_value(value: ScriptValue) -> Option<Self> {
        Some(value)
    }
}

impl FromScriptValue for () {
    const KIND: &'static str = "void";

    fn from_script_value(value: ScriptValue) -> Option<Self> {
        value.is_void().then_some(())
    }
}

macro_rules! impl_from_script_value {
    ($($ty:ty => $variant:ident, $kind:literal),* $(,)?) => {
        $(
            impl FromScriptValue for $ty {
                const KIND: &'static str = $kind;

                fn from_script_value(value: ScriptValue) -> Option<Self> {
                    match value {
                        ScriptValue::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_from_script_value! {
    bool => Bool, "bool",
    i8 => Int8, "int8",
    i16 => Int16, "int16",
    i32 => Int32, "int32",
    i64 => Int64, "int64",
    u8 => UInt8, "uint8",
    u16 => UInt16, "uint16",
    u32 => UInt32, "uint32",
    u64 => UInt64, "uint64",
    f32 => Float, "float",
    f64 => Double, "double",
    String => String, "string",
}
