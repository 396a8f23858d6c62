//! LaTeX wrapper documents.
//!
//! A sanitized expression is rendered inside one of two wrapper documents.
//! The default wrapper typesets the expression directly; the depth wrapper
//! boxes it and writes its width, height and depth to `\jobname.info` so the
//! image can be aligned with the surrounding baseline.

use crate::context::{LatexMethod, MathMode};
use crate::pipeline::{Sanitized, resolve_evals, symbols_for};
use crate::splice::{Case, replace};

const DEFAULT_WRAPPER: &str = "\\documentclass[%%dclassoptions%%]{%%dclass%%}
\\usepackage{amsmath}
\\usepackage{amsfonts}
\\usepackage{amssymb}
%%usepackage%%
%%pagestyle%%
%%previewenviron%%
\\begin{document}
\\setlength{\\parindent}{0pt}
%%fontsize%%
%%setlength%%
%%beginmath%%
%%expression%%
%%endmath%%
\\end{document}
";

const DEPTH_WRAPPER: &str = "\\documentclass[%%dclassoptions%%]{%%dclass%%}
\\usepackage{amsmath}
\\usepackage{amsfonts}
\\usepackage{amssymb}
%%usepackage%%
\\newcommand{\\amsatop}[2]{{\\genfrac{}{}{0pt}{1}{#1}{#2}}}
\\newcommand{\\twolines}[2]{{\\amsatop{\\mbox{#1}}{\\mbox{#2}}}}
\\newcommand{\\fs}{{\\eval{fs}}}
%%pagestyle%%
%%previewenviron%%
\\newsavebox{\\mybox}

\\newlength{\\mywidth}
\\newlength{\\myheight}
\\newlength{\\mydepth}

\\setlength{\\parindent}{0pt}
%%fontsize%%
%%setlength%%

\\begin{lrbox}{\\mybox}
%%beginmath%%
%%expression%%
%%endmath%%
\\end{lrbox}

\\settowidth {\\mywidth}  {\\usebox{\\mybox}}
\\settoheight{\\myheight} {\\usebox{\\mybox}}
\\settodepth {\\mydepth}  {\\usebox{\\mybox}}

\\newwrite\\foo
\\immediate\\openout\\foo=\\jobname.info
    \\immediate\\write\\foo{depth = \\the\\mydepth}
    \\immediate\\write\\foo{height = \\the\\myheight}
    \\addtolength{\\myheight} {\\mydepth}
    \\immediate\\write\\foo{totalheight = \\the\\myheight}
    \\immediate\\write\\foo{width = \\the\\mywidth}
\\closeout\\foo

\\begin{document}
\\usebox{\\mybox}
\\end{document}
";

fn math_delimiters(mode: MathMode) -> (&'static str, &'static str) {
    match mode {
        MathMode::Display => (" \\noindent $\\displaystyle ", " $ "),
        MathMode::Text => (" \\noindent $ ", " $ "),
        MathMode::Paragraph => (" ", " "),
    }
}

/// Fills the wrapper document for `sanitized`.
///
/// Placeholders that do not apply to the expression are removed. `\eval{}`
/// directives in the wrapper are resolved against the expression's font
/// size.
pub fn render_document(sanitized: &Sanitized) -> String {
    let ctx = &sanitized.context;
    let mut doc = if ctx.depth { DEPTH_WRAPPER } else { DEFAULT_WRAPPER }.to_string();
    let pdf_picture = ctx.picture && ctx.latex_method == LatexMethod::Pdflatex;

    let packages: String = ctx
        .packages
        .iter()
        .map(|p| match &p.options {
            Some(options) => format!("\\usepackage[{}]{{{}}}\n", options, p.name),
            None => format!("\\usepackage{{{}}}\n", p.name),
        })
        .collect();
    let (begin_math, end_math) = math_delimiters(ctx.math_mode);
    let set_length = if ctx.picture && !sanitized.text.contains("\\unitlength") {
        "\\setlength{\\unitlength}{1.0in}"
    } else {
        ""
    };

    let fills = [
        ("%%dclassoptions%%", ctx.document_class_options.as_str()),
        ("%%dclass%%", ctx.document_class.as_str()),
        ("%%usepackage%%", packages.as_str()),
        ("%%pagestyle%%", if pdf_picture { "" } else { "\\pagestyle{empty}" }),
        (
            "%%previewenviron%%",
            if pdf_picture { "\\PreviewEnvironment{picture}" } else { "" },
        ),
        ("%%fontsize%%", ctx.font_size_directive()),
        ("%%setlength%%", set_length),
        ("%%beginmath%%", begin_math),
        ("%%endmath%%", end_math),
    ];
    for (placeholder, value) in fills {
        replace(&mut doc, placeholder, value, Case::Sensitive, 0).ok();
    }
    resolve_evals(&mut doc, &symbols_for(ctx));

    replace(&mut doc, "%%expression%%", &sanitized.text, Case::Sensitive, 1).ok();
    doc
}
