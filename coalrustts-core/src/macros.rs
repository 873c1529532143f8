#![macro_use]

// Identifier newtypes wrap a signed integer
// where -1 is reserved to mean "no such object".
macro_rules! impl_id_type {
    ($idtype: ident, $integer_type: ty) => {
        impl $idtype {
            /// NULL value for the type
            pub const NULL: $idtype = Self(-1);

            /// Get the underlying integer
            pub fn raw(self) -> $integer_type {
                self.0
            }

            /// `true` if `self` is [`Self::NULL`]
            pub fn is_null(self) -> bool {
                self.0 == -1
            }
        }

        impl From<$integer_type> for $idtype {
            fn from(value: $integer_type) -> Self {
                if value >= 0 {
                    Self(value)
                } else {
                    Self::NULL
                }
            }
        }

        impl From<$idtype> for $integer_type {
            fn from(value: $idtype) -> Self {
                value.0
            }
        }

        impl std::fmt::Display for $idtype {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<$idtype> for usize {
            type Error = $crate::Error;

            fn try_from(value: $idtype) -> Result<Self, Self::Error> {
                usize::try_from(value.0).map_err(|_| {
                    $crate::Error::ConversionError(format!(
                        "{} {} is not a valid index",
                        stringify!($idtype),
                        value
                    ))
                })
            }
        }

        impl TryFrom<usize> for $idtype {
            type Error = $crate::Error;

            fn try_from(value: usize) -> Result<Self, Self::Error> {
                <$integer_type>::try_from(value).map(Self).map_err(|_| {
                    $crate::Error::ConversionError(format!(
                        "{} overflows {}",
                        value,
                        stringify!($idtype)
                    ))
                })
            }
        }

        impl PartialEq<$integer_type> for $idtype {
            fn eq(&self, other: &$integer_type) -> bool {
                self.0 == *other
            }
        }

        impl PartialEq<$idtype> for $integer_type {
            fn eq(&self, other: &$idtype) -> bool {
                *self == other.0
            }
        }
    };
}
