/// Implement the [`scroll`] traits for fixed-layout wire structs using [`zerocopy`].
macro_rules! impl_scroll_with_zerocopy {
    ($($ty:ident),+ $(,)?) => {$(
        impl scroll::ctx::TryIntoCtx for $ty {
            type Error = scroll::Error;

            fn try_into_ctx(self, dst: &mut [u8], _ctx: ()) -> Result<usize, Self::Error> {
                use scroll::Pwrite;
                use zerocopy::IntoBytes;
                let offset = &mut 0;
                dst.gwrite(self.as_bytes(), offset)?;
                Ok(*offset)
            }
        }
        impl scroll::ctx::TryFromCtx<'_> for $ty {
            type Error = scroll::Error;

            fn try_from_ctx(from: &[u8], _ctx: ()) -> Result<(Self, usize), Self::Error> {
                use zerocopy::FromBytes;
                Ok((
                    Self::read_from_prefix(from)
                        .map_err(|_| scroll::Error::TooBig {
                            size: size_of::<Self>(),
                            len: from.len(),
                        })?
                        .0,
                    size_of::<Self>(),
                ))
            }
        }
        impl scroll::ctx::SizeWith<()> for $ty {
            fn size_with(_: &()) -> usize {
                size_of::<Self>()
            }
        }
    )+};
}
pub(crate) use impl_scroll_with_zerocopy;

/// Derive list shared by every fixed-layout wire struct.
macro_rules! wire_struct {
    ($(#[$m:meta])* $vis:vis struct $name:ident { $($body:tt)* }) => {
        $(#[$m])*
        #[derive(
            Debug,
            Default,
            Clone,
            Copy,
            PartialEq,
            Eq,
            zerocopy::FromBytes,
            zerocopy::IntoBytes,
            zerocopy::Immutable,
            zerocopy::KnownLayout,
            zerocopy::Unaligned,
        )]
        #[repr(C)]
        $vis struct $name { $($body)* }
        $crate::macros::impl_scroll_with_zerocopy!($name);
    };
}
pub(crate) use wire_struct;
