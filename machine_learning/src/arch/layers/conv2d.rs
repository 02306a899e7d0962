use ndarray::{linalg, prelude::*};
use rayon::prelude::*;

use crate::{MlErr, Result, arch::activations::ActFn};

/// The spatial arrangement of a convolution over a single image.
#[derive(Debug, Clone, Copy)]
struct Geometry {
    kernel: (usize, usize),
    stride: usize,
    padding: usize,
    out: (usize, usize),
}

impl Geometry {
    /// Maps an output position and a kernel offset to a position in the (unpadded) input, or
    /// `None` if it falls in the zero padding.
    #[inline]
    fn source(
        &self,
        (oy, ox): (usize, usize),
        (ky, kx): (usize, usize),
        (h, w): (usize, usize),
    ) -> Option<(usize, usize)> {
        let iy = (oy * self.stride + ky).checked_sub(self.padding)?;
        let ix = (ox * self.stride + kx).checked_sub(self.padding)?;
        (iy < h && ix < w).then_some((iy, ix))
    }
}

/// A 2D convolution with square stride and zero padding, implemented as *im2col* followed by
/// a matrix product. The parameters are the kernels, shaped `(out, in, kh, kw)` in row major
/// order, followed by the `out` biases.
#[derive(Debug, Clone)]
pub struct Conv2d {
    in_channels: usize,
    out_channels: usize,
    kernel: (usize, usize),
    stride: usize,
    padding: usize,
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    input_dim: (usize, usize, usize, usize),
    cols: Option<Array2<f32>>,
    z: Option<Array4<f32>>,
}

impl Conv2d {
    /// Creates a new `Conv2d` layer.
    ///
    /// # Arguments
    /// * `in_channels` - The amount of channels of the input images.
    /// * `out_channels` - The amount of kernels, that is, the channels of the output.
    /// * `kernel` - The height and width of each kernel.
    /// * `stride` - The step between consecutive kernel applications, must be at least 1.
    /// * `padding` - The amount of zeros added around each side of the input.
    /// * `act_fn` - An optional activation applied to the output.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel: (usize, usize),
        stride: usize,
        padding: usize,
        act_fn: Option<ActFn>,
    ) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel,
            stride,
            padding,
            act_fn,
            size: out_channels * (in_channels * kernel.0 * kernel.1 + 1),
            input_dim: (0, 0, 0, 0),
            cols: None,
            z: None,
        }
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn kernel(&self) -> (usize, usize) {
        self.kernel
    }

    /// Computes the spatial size of the output for an input of the given height and width.
    ///
    /// # Returns
    /// The output height and width, or an error if the kernel doesn't fit in the padded input.
    pub fn output_hw(&self, (h, w): (usize, usize)) -> Result<(usize, usize)> {
        let (kh, kw) = self.kernel;
        let (ph, pw) = (h + 2 * self.padding, w + 2 * self.padding);

        if self.stride == 0 {
            return Err(MlErr::InvalidLayer("conv2d stride must be at least 1".into()));
        }

        if kh == 0 || kw == 0 || ph < kh || pw < kw {
            return Err(MlErr::InvalidLayer(format!(
                "a {kh}x{kw} kernel doesn't fit a {ph}x{pw} padded input"
            )));
        }

        Ok(((ph - kh) / self.stride + 1, (pw - kw) / self.stride + 1))
    }

    pub fn forward(&mut self, params: &[f32], x: Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        if c != self.in_channels {
            return Err(MlErr::SizeMismatch {
                what: "conv2d input channels",
                got: c,
                expected: self.in_channels,
            });
        }

        let (oh, ow) = self.output_hw((h, w))?;
        let geometry = self.geometry((oh, ow));
        let k = self.patch_len();

        let mut cols = Array3::<f32>::zeros((n, oh * ow, k));
        cols.outer_iter_mut()
            .into_par_iter()
            .zip(x.outer_iter().into_par_iter())
            .for_each(|(col, img)| im2col(img, col, geometry));
        let cols = cols.into_shape_with_order((n * oh * ow, k))?;

        let (kernels, b) = self.view_params(params)?;
        let mut z = Array2::<f32>::zeros((n * oh * ow, self.out_channels));
        linalg::general_mat_mul(1.0, &cols, &kernels.t(), 0.0, &mut z);
        z += &b;

        let z = z
            .into_shape_with_order((n, oh, ow, self.out_channels))?
            .permuted_axes([0, 3, 1, 2])
            .as_standard_layout()
            .into_owned();

        self.input_dim = (n, c, h, w);
        self.cols = Some(cols);

        let Some(act_fn) = &self.act_fn else {
            self.z = None;
            return Ok(z);
        };

        let a = z.mapv(|z| act_fn.f(z));
        self.z = Some(z);
        Ok(a)
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array4<f32>,
    ) -> Result<Array4<f32>> {
        let cols = self
            .cols
            .as_ref()
            .ok_or(MlErr::BackwardBeforeForward { layer: "conv2d" })?;

        let (n, c, h, w) = self.input_dim;
        let (oh, ow) = self.output_hw((h, w))?;
        if d.dim() != (n, self.out_channels, oh, ow) {
            return Err(MlErr::SizeMismatch {
                what: "conv2d output gradient",
                got: d.len(),
                expected: n * self.out_channels * oh * ow,
            });
        }

        if let (Some(act_fn), Some(z)) = (&self.act_fn, &self.z) {
            d.zip_mut_with(z, |d, &z| *d *= act_fn.df(z));
        }

        let d = d
            .permuted_axes([0, 2, 3, 1])
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((n * oh * ow, self.out_channels))?;

        let (mut dk, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &d.t(), cols, 1.0, &mut dk);
        db += &d.sum_axis(Axis(0));

        let (kernels, _) = self.view_params(params)?;
        let mut dcols = Array2::<f32>::zeros((n * oh * ow, self.patch_len()));
        linalg::general_mat_mul(1.0, &d, &kernels, 0.0, &mut dcols);
        let dcols = dcols.into_shape_with_order((n, oh * ow, self.patch_len()))?;

        let geometry = self.geometry((oh, ow));
        let mut dx = Array4::<f32>::zeros((n, c, h, w));
        dx.outer_iter_mut()
            .into_par_iter()
            .zip(dcols.outer_iter().into_par_iter())
            .for_each(|(img, col)| col2im(col, img, geometry));

        Ok(dx)
    }

    fn patch_len(&self) -> usize {
        self.in_channels * self.kernel.0 * self.kernel.1
    }

    fn geometry(&self, out: (usize, usize)) -> Geometry {
        Geometry {
            kernel: self.kernel,
            stride: self.stride,
            padding: self.padding,
            out,
        }
    }

    /// Gives a view of the raw gradient slice as the delta kernels and delta biases of this
    /// layer, the kernels flattened to `(out, in * kh * kw)`.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len(grad.len())?;

        let (dk_raw, db_raw) = grad.split_at_mut(self.size - self.out_channels);
        let dk = ArrayViewMut2::from_shape((self.out_channels, self.patch_len()), dk_raw)?;
        let db = ArrayViewMut1::from_shape(self.out_channels, db_raw)?;
        Ok((dk, db))
    }

    /// Gives a view of the raw parameter slice as the kernels and biases of this layer, the
    /// kernels flattened to `(out, in * kh * kw)`.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len(params.len())?;

        let (k_raw, b_raw) = params.split_at(self.size - self.out_channels);
        let kernels = ArrayView2::from_shape((self.out_channels, self.patch_len()), k_raw)?;
        let biases = ArrayView1::from_shape(self.out_channels, b_raw)?;
        Ok((kernels, biases))
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.size {
            return Err(MlErr::SizeMismatch {
                what: "conv2d parameters",
                got: len,
                expected: self.size,
            });
        }

        Ok(())
    }
}

/// Unfolds every receptive field of `img` (`(c, h, w)`) into a row of `col`
/// (`(oh * ow, c * kh * kw)`).
fn im2col(img: ArrayView3<f32>, mut col: ArrayViewMut2<f32>, geometry: Geometry) {
    let (c, h, w) = img.dim();
    let (kh, kw) = geometry.kernel;
    let (oh, ow) = geometry.out;

    for oy in 0..oh {
        for ox in 0..ow {
            let mut row = col.row_mut(oy * ow + ox);
            let mut i = 0;

            for ch in 0..c {
                for ky in 0..kh {
                    for kx in 0..kw {
                        if let Some((iy, ix)) = geometry.source((oy, ox), (ky, kx), (h, w)) {
                            row[i] = img[[ch, iy, ix]];
                        }

                        i += 1;
                    }
                }
            }
        }
    }
}

/// Folds the rows of `col` back into `img`, adding up overlapping receptive fields. The
/// inverse of `im2col` with respect to the gradient.
fn col2im(col: ArrayView2<f32>, mut img: ArrayViewMut3<f32>, geometry: Geometry) {
    let (c, h, w) = img.dim();
    let (kh, kw) = geometry.kernel;
    let (oh, ow) = geometry.out;

    for oy in 0..oh {
        for ox in 0..ow {
            let row = col.row(oy * ow + ox);
            let mut i = 0;

            for ch in 0..c {
                for ky in 0..kh {
                    for kx in 0..kw {
                        if let Some((iy, ix)) = geometry.source((oy, ox), (ky, kx), (h, w)) {
                            img[[ch, iy, ix]] += row[i];
                        }

                        i += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_size_accounts_for_stride_and_padding() {
        let conv = Conv2d::new(1, 1, (3, 3), 1, 1, None);
        assert_eq!(conv.output_hw((8, 8)).unwrap(), (8, 8));

        let conv = Conv2d::new(1, 1, (3, 3), 2, 0, None);
        assert_eq!(conv.output_hw((7, 7)).unwrap(), (3, 3));

        let conv = Conv2d::new(1, 1, (5, 5), 1, 0, None);
        assert!(conv.output_hw((3, 3)).is_err());
    }

    #[test]
    fn forward_matches_a_hand_computed_convolution() {
        // A single 2x2 kernel of ones with bias 1 over a 3x3 image without padding.
        let mut conv = Conv2d::new(1, 1, (2, 2), 1, 0, None);
        let params = [1., 1., 1., 1., 1.];
        let x = Array4::from_shape_vec((1, 1, 3, 3), (1..=9).map(|v| v as f32).collect()).unwrap();

        let y = conv.forward(&params, x).unwrap();
        let expected =
            Array4::from_shape_vec((1, 1, 2, 2), vec![13., 17., 25., 29.]).unwrap();
        assert_eq!(y, expected);
    }

    #[test]
    fn padding_reads_zeros_outside_the_image() {
        let mut conv = Conv2d::new(1, 1, (3, 3), 1, 1, None);
        let mut params = [0.; 10];
        params[4] = 1.; // identity kernel
        let x = Array4::from_shape_vec((1, 1, 2, 2), vec![1., 2., 3., 4.]).unwrap();

        let y = conv.forward(&params, x.clone()).unwrap();
        assert_eq!(y, x);
    }

    #[test]
    fn output_channels_come_from_separate_kernels() {
        let mut conv = Conv2d::new(1, 2, (1, 1), 1, 0, None);
        let params = [2., -1., 0., 10.];
        let x = Array4::from_shape_vec((1, 1, 1, 2), vec![1., 3.]).unwrap();

        let y = conv.forward(&params, x).unwrap();
        let expected = Array4::from_shape_vec((1, 2, 1, 2), vec![2., 6., 9., 7.]).unwrap();
        assert_eq!(y, expected);
    }

    #[test]
    fn backward_computes_kernel_bias_and_input_gradients() {
        let mut conv = Conv2d::new(1, 1, (2, 2), 1, 0, None);
        let params = [1., 2., 3., 4., 0.];
        let mut grad = [0.; 5];
        let x = Array4::from_shape_vec((1, 1, 3, 3), (1..=9).map(|v| v as f32).collect()).unwrap();

        conv.forward(&params, x).unwrap();
        let dx = conv
            .backward(&params, &mut grad, Array4::ones((1, 1, 2, 2)))
            .unwrap();

        // dK[i] is the sum of the inputs each kernel entry touched.
        assert_eq!(grad, [12., 16., 24., 28., 4.]);

        let expected = Array4::from_shape_vec(
            (1, 1, 3, 3),
            vec![1., 3., 2., 4., 10., 6., 3., 7., 4.],
        )
        .unwrap();
        assert_eq!(dx, expected);
    }

    #[test]
    fn pointwise_kernels_on_a_single_channel_keep_the_layout() {
        // in_channels * kh * kw == 1 makes every matrix in the product a single row or column.
        let mut conv = Conv2d::new(1, 3, (1, 1), 1, 0, None);
        let params = [1., 2., -1., 0., 0., 1.];
        let mut grad = [0.; 6];
        let x = Array4::from_shape_vec((2, 1, 2, 2), (1..=8).map(|v| v as f32).collect()).unwrap();

        let y = conv.forward(&params, x.clone()).unwrap();
        assert_eq!(y.dim(), (2, 3, 2, 2));
        assert!(y.is_standard_layout());
        assert_eq!(y.slice(s![.., 0, .., ..]), x.slice(s![.., 0, .., ..]));
        assert_eq!(y.slice(s![.., 1, .., ..]), x.slice(s![.., 0, .., ..]).mapv(|v| 2. * v));
        assert_eq!(y.slice(s![.., 2, .., ..]), x.slice(s![.., 0, .., ..]).mapv(|v| 1. - v));

        let dx = conv
            .backward(&params, &mut grad, Array4::ones((2, 3, 2, 2)))
            .unwrap();
        // Every input pixel feeds all three kernels.
        assert_eq!(dx, Array4::from_elem((2, 1, 2, 2), 2.));
        assert_eq!(grad, [36., 36., 36., 8., 8., 8.]);
    }

    #[test]
    fn zero_stride_is_rejected() {
        let conv = Conv2d::new(1, 1, (3, 3), 0, 0, None);
        assert!(matches!(conv.output_hw((8, 8)), Err(MlErr::InvalidLayer(_))));
    }

    #[test]
    fn wrong_channel_count_is_an_error() {
        let mut conv = Conv2d::new(3, 1, (1, 1), 1, 0, None);
        let params = [0.; 4];
        let x = Array4::zeros((1, 1, 2, 2));
        assert!(conv.forward(&params, x).is_err());
    }
}
