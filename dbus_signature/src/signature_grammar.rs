pub use grammar::*;

peg::parser! {
    grammar grammar() for str {
        use crate::BasicType;
        use crate::SingleType;

        rule basic() -> BasicType
            = "y" { BasicType::Byte }
            / "b" { BasicType::Boolean }
            / "n" { BasicType::Int16 }
            / "q" { BasicType::Uint16 }
            / "i" { BasicType::Int32 }
            / "u" { BasicType::Uint32 }
            / "x" { BasicType::Int64 }
            / "t" { BasicType::Uint64 }
            / "d" { BasicType::Double }
            / "s" { BasicType::String }
            / "o" { BasicType::ObjectPath }
            / "g" { BasicType::Signature }
            / "h" { BasicType::UnixFd }
            / expected!("<basic type code>")

        /* dict entries only ever appear as the element of an array */
        rule dict() -> SingleType
            = "a{" k:basic() v:single() "}" { SingleType::Dict(k, Box::new(v)) }

        rule single() -> SingleType
            = b:basic() { SingleType::Basic(b) }
            / "v" { SingleType::Variant }
            / d:dict() { d }
            / "a" e:single() { SingleType::Array(Box::new(e)) }
            / "(" f:single()+ ")" { SingleType::Struct(f) }

        pub rule signature() -> Vec<SingleType>
            = single()*
    }
}
