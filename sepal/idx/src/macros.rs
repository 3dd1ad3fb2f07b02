#[macro_export]
/// Implements the [IndexRef](crate::IndexRef) trait for a type wrapping an
/// unsigned integer. By default the backing type is a [`u32`]; a different
/// backing type may be given as the second argument.
macro_rules! impl_index {
    ($struct_name: ident) => {
        impl_index!($struct_name, u32);
    };

    ($struct_name: ident, $backing_ty: ty) => {
        impl $crate::IndexRef for $struct_name {
            fn index(&self) -> usize {
                self.0 as usize
            }

            fn new(input: usize) -> Self {
                Self(input as $backing_ty)
            }
        }

        impl From<$backing_ty> for $struct_name {
            fn from(input: $backing_ty) -> Self {
                $struct_name(input)
            }
        }

        impl From<usize> for $struct_name {
            fn from(input: usize) -> Self {
                $crate::IndexRef::new(input)
            }
        }
    };
}

#[macro_export]
/// Implements the [IndexRef](crate::IndexRef) trait for a type wrapping a
/// NonZero integer, so that `Option<Idx>` is the same size as `Idx`. The
/// stored value is offset by one from the index it denotes. By default the
/// backing type is a [`NonZeroU32`](std::num::NonZeroU32).
macro_rules! impl_index_nonzero {
    ($struct_name: ident) => {
        impl_index_nonzero!($struct_name, std::num::NonZeroU32, u32);
    };

    ($struct_name: ident, $non_zero_type:ty, $normal_type:ty) => {
        impl $crate::IndexRef for $struct_name {
            fn index(&self) -> usize {
                self.0.get() as usize - 1
            }

            fn new(input: usize) -> Self {
                Self(
                    <$non_zero_type>::new((input + 1) as $normal_type).unwrap(),
                )
            }
        }

        impl From<$non_zero_type> for $struct_name {
            fn from(input: $non_zero_type) -> Self {
                $struct_name(input)
            }
        }

        impl From<usize> for $struct_name {
            fn from(input: usize) -> Self {
                $crate::IndexRef::new(input)
            }
        }
    };
}
