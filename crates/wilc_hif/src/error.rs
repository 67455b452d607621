error_set::error_set! {
    /// Errors decoding or encoding configuration objects.
    CodecError = {
        #[display("declared length {len} exceeds remaining {remaining} bytes")]
        MalformedLength { len: usize, remaining: usize },
        #[display("unknown object kind {kind:#04x}")]
        UnknownKind { kind: u8 },
        #[display("object {id:#06x} has width {len}, expected {expected}")]
        WidthMismatch { id: u16, len: usize, expected: usize },
        #[display("output buffer too small")]
        BufferTooSmall,
    };
    /// Errors from one exchange with firmware.
    DispatchError = {
        #[display("transport could not deliver or receive")]
        TransportFailure,
        #[display("firmware did not answer in time")]
        Timeout,
        /// Response shorter than declared, out of sequence, or missing a requested object.
        #[display("malformed firmware response")]
        MalformedResponse,
        #[display("firmware rejected request: status={status}")]
        Rejected { status: u8 },
    } || CodecError;
    QueueError = {
        #[display("device is tearing down")]
        QueueClosed,
        #[display("work queue full")]
        QueueFull,
        /// Work item targets an interface that isn't registered.
        #[display("work item has no target")]
        InvalidItem,
    };
    /// Errors returned by host interface operations.
    HifError = {
        #[display("invalid argument")]
        InvalidArgument,
        /// A state-machine precondition isn't met on this or a sibling interface.
        #[display("interface busy")]
        Busy,
        #[display("out of memory")]
        OutOfMemory,
        #[display("no such interface")]
        NoInterface,
    } || DispatchError || QueueError;
}
