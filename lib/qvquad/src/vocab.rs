//! Provides IRIs of the datatype vocabularies used by the canonical value forms.

pub mod schema {
    //! [Schema.org](https://schema.org/) datatypes, the default namespace of
    //! the native value kinds.

    use crate::IriRef;

    /// An integer number.
    pub const INTEGER: IriRef<'_> = IriRef::new_unchecked("http://schema.org/Integer");
    /// A floating point number.
    pub const FLOAT: IriRef<'_> = IriRef::new_unchecked("http://schema.org/Float");
    /// A boolean.
    pub const BOOLEAN: IriRef<'_> = IriRef::new_unchecked("http://schema.org/Boolean");
    /// A combination of date and time in [ISO 8601](https://en.wikipedia.org/wiki/ISO_8601).
    pub const DATE_TIME: IriRef<'_> = IriRef::new_unchecked("http://schema.org/DateTime");
    /// A plain text string.
    pub const TEXT: IriRef<'_> = IriRef::new_unchecked("http://schema.org/Text");
}

pub mod xsd {
    //! [XML Schema datatypes](https://www.w3.org/TR/xmlschema11-2/) recognised
    //! by the typed-string conversion registry.

    use crate::IriRef;

    /// Boolean type: true or false.
    pub const BOOLEAN: IriRef<'_> = IriRef::new_unchecked("http://www.w3.org/2001/XMLSchema#boolean");
    /// Arbitrary-size integer numbers.
    pub const INTEGER: IriRef<'_> = IriRef::new_unchecked("http://www.w3.org/2001/XMLSchema#integer");
    /// 32-bit signed integers.
    pub const INT: IriRef<'_> = IriRef::new_unchecked("http://www.w3.org/2001/XMLSchema#int");
    /// 64-bit signed integers.
    pub const LONG: IriRef<'_> = IriRef::new_unchecked("http://www.w3.org/2001/XMLSchema#long");
    /// 16-bit signed integers.
    pub const SHORT: IriRef<'_> = IriRef::new_unchecked("http://www.w3.org/2001/XMLSchema#short");
    /// 32-bit floating point numbers.
    pub const FLOAT: IriRef<'_> = IriRef::new_unchecked("http://www.w3.org/2001/XMLSchema#float");
    /// 64-bit floating point numbers.
    pub const DOUBLE: IriRef<'_> = IriRef::new_unchecked("http://www.w3.org/2001/XMLSchema#double");
    /// Character strings.
    pub const STRING: IriRef<'_> = IriRef::new_unchecked("http://www.w3.org/2001/XMLSchema#string");
    /// Date and time with or without timezone.
    pub const DATE_TIME: IriRef<'_> =
        IriRef::new_unchecked("http://www.w3.org/2001/XMLSchema#dateTime");
    /// Gregorian calendar date.
    pub const DATE: IriRef<'_> = IriRef::new_unchecked("http://www.w3.org/2001/XMLSchema#date");
}
